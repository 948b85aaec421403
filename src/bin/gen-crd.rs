use kube::CustomResourceExt;
use registry_migrator::crd::registry::ImageRegistry;

fn main() -> anyhow::Result<()> {
    // Use: cargo run --bin gen-crd | python3 -c "import sys,json,yaml; print(yaml.dump(json.load(sys.stdin), default_flow_style=False))"
    // to convert to YAML
    let crd = serde_json::to_string_pretty(&ImageRegistry::crd())?;
    println!("{}", crd);
    Ok(())
}
