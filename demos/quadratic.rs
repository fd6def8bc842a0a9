use log::info;
use mathfn_rs::{FunctionRef, JsonFileStore, Registry, RegistryConfig};
use std::collections::HashMap;

#[tokio::main]
async fn main() -> mathfn_rs::Result<()> {
    pretty_env_logger::init();

    let config = RegistryConfig::load()?;
    let registry = Registry::open_with_config(JsonFileStore::new(&config.storage_path), &config).await?;
    info!("Using snapshot {}", registry.store().path().display());

    let quadratic = match registry.get_by_name("quadratic").await {
        Ok(function) => function,
        Err(_) => {
            let params = HashMap::from([
                ("a".to_string(), 1.0),
                ("b".to_string(), -2.0),
                ("c".to_string(), 1.0),
            ]);
            registry
                .define("quadratic", "a * x**2 + b * x + c", params)
                .await?
        }
    };
    println!("Created: {:?}", quadratic);

    let y = registry.compute(&FunctionRef::name("quadratic"), 3.0).await?;
    println!("Computed: {}", y);

    for function in registry.list().await {
        println!("List: {} = {} {:?}", function.name, function.expression, function.params);
    }
    Ok(())
}
