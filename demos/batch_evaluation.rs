use mathfn_rs::{FunctionRef, MemoryStore, Registry};
use std::collections::HashMap;

#[tokio::main]
async fn main() -> mathfn_rs::Result<()> {
    pretty_env_logger::init();

    let registry = Registry::open(MemoryStore::new()).await?;
    registry
        .define(
            "damped",
            "amplitude * exp(-decay * x) * cos(tau * x)",
            HashMap::from([("amplitude".to_string(), 2.0), ("decay".to_string(), 0.5)]),
        )
        .await?;

    let xs: Vec<f64> = (0..=20).map(|i| f64::from(i) / 4.0).collect();
    let ys = registry
        .compute_batch(&FunctionRef::name("damped"), &xs)
        .await?;

    for (x, y) in xs.iter().zip(&ys) {
        println!("damped({:>5.2}) = {:>9.5}", x, y);
    }
    Ok(())
}
