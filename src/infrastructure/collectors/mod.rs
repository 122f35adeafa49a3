pub mod cert;
pub mod dns;
pub mod graph;
pub mod leak;

pub use cert::CertCollector;
pub use dns::DnsCollector;
pub use graph::GraphCollector;
pub use leak::LeakCollector;
