//! Prints the SecretProviderClass CRD as YAML.
//!
//! Useful for local clusters where the CSI driver chart is not installed.

use crds::SecretProviderClass;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&SecretProviderClass::crd())?);
    Ok(())
}
