use cached::proc_macro::cached;
use config::{Config, File, FileFormat};
use futures_locks::RwLock;
use once_cell::sync::Lazy;
use serde::Deserialize;

static CONFIG_BUILDER: Lazy<RwLock<Config>> = Lazy::new(|| {
    RwLock::new({
        let mut builder = Config::builder().add_source(File::from_str(
            include_str!("../Quad.toml"),
            FileFormat::Toml,
        ));

        if std::path::Path::new("Quad.toml").exists() {
            builder = builder.add_source(File::new("Quad.toml", FileFormat::Toml));
        }

        builder.build().unwrap()
    })
});

#[derive(Deserialize, Debug, Clone)]
pub struct Database {
    /// Connection string for MongoDB; leave empty to run on the
    /// in-memory reference database.
    pub mongodb: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Hosts {
    pub events: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiSecurity {
    pub jwt_secret: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Api {
    pub security: ApiSecurity,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Events {
    /// Seconds between stale-connection sweeps
    pub heartbeat_interval: u64,

    /// Seconds of silence before a connection is considered dead
    pub heartbeat_timeout: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FeaturesLimits {
    pub message_length: usize,
    pub content_preview_length: usize,
    pub page_size: usize,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Features {
    pub limits: FeaturesLimits,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Sentry {
    pub dsn: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub database: Database,
    pub hosts: Hosts,
    pub api: Api,
    pub events: Events,
    pub features: Features,
    pub sentry: Sentry,
}

pub async fn init() {
    println!(
        ":: Quad Configuration ::\n\x1b[32m{:?}\x1b[0m",
        config().await
    );
}

pub async fn read() -> Config {
    CONFIG_BUILDER.read().await.clone()
}

#[cached(time = 30)]
pub async fn config() -> Settings {
    read().await.try_deserialize::<Settings>().unwrap()
}

/// Configure logging and error reporting, reading common variables
/// from the environment.
///
/// The returned guard must be held for the lifetime of the process.
pub fn setup_logging(dsn: &str) -> sentry::ClientInitGuard {
    dotenv::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::init();

    sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ))
}

/// Log the given error, report it upstream and replace it with an
/// opaque internal error.
#[cfg(feature = "report-macros")]
#[macro_export]
macro_rules! report_internal_error {
    ( $expr: expr ) => {
        $expr.map_err(|err| {
            log::error!("Internal error occurred: {err:?}");
            sentry::capture_error(&err);
            quad_result::create_error!(InternalError)
        })
    };
}

#[cfg(feature = "test")]
#[cfg(test)]
mod tests {
    use crate::init;

    #[async_std::test]
    async fn it_works() {
        init().await;
    }
}
