use std::env;

use anyhow::Context;
use ipr_model_zoo::{SignAlexNet, arch::IN_CHANNELS, config::RunConfig};
use log::{info, warn};
use ndarray::{Array4, Axis};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::{SeedableRng, rngs::StdRng};

const CONFIG_ENV: &str = "IPR_CONFIG";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1).or_else(|| env::var(CONFIG_ENV).ok()) {
        Some(path) => {
            RunConfig::load(&path).with_context(|| format!("cannot load config '{path}'"))?
        }
        None => {
            warn!("no config given, using defaults");
            RunConfig::default()
        }
    };
    info!("{config:?}");

    let mut model = match config.seed {
        Some(seed) => SignAlexNet::with_seed(config.num_classes, seed)?,
        None => SignAlexNet::new(config.num_classes)?,
    };

    let stages = model.features().iter().zip(model.layer_sizes());
    for (position, (layer, size)) in stages.enumerate() {
        info!("stage {position}: {:?} params={size}", layer.role());
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let shape = (
        config.batch_size,
        IN_CHANNELS,
        config.resolution,
        config.resolution,
    );
    let x = Array4::random_using(shape, Uniform::new(0f32, 1.)?, &mut rng);

    model.train();
    let scores = model.forward(x.view()).context("training mode forward")?;
    info!("scores: {:?}", scores.shape());

    model.eval();
    let probs = model.forward(x.view()).context("evaluation mode forward")?;
    let sums = probs.sum_axis(Axis(1));
    info!("probabilities: {:?} row sums: {sums}", probs.shape());

    Ok(())
}
