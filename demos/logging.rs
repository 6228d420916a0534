use tracing_subscriber::{prelude::*, EnvFilter};

/// Log to stderr, filtered by `RUST_LOG` (`info` by default)
pub fn setup() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).with(filter).init();
}

#[allow(dead_code)]
fn main() {
  eprintln!("This is only a library file")
}
