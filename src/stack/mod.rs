//! Compose stack deployment through the docker CLI

mod deployer;
mod manager;

pub use deployer::StackDeployer;
pub use manager::{DockerCliStackManager, StackManager};
