use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "thrum-server")]
#[command(about = "Serves TestService over HTTP in binary, compact, JSON and text encodings")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "THRUM_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "THRUM_PORT", default_value_t = 8080)]
    pub port: u16,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags() {
        let config =
            Config::try_parse_from(["thrum-server", "--host", "127.0.0.1", "--port", "9090"])
                .unwrap();
        assert_eq!(config.addr(), "127.0.0.1:9090".parse().unwrap());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Config::try_parse_from(["thrum-server", "--port", "99999"]).is_err());
    }
}
