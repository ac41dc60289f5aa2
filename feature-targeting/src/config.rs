use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3301")]
    pub address: SocketAddr,

    #[envconfig(default = "false")]
    pub debug: bool,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            address: "127.0.0.1:0".parse().expect("valid address"),
            debug: false,
        }
    }
}
