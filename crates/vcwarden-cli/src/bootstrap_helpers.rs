use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub(crate) fn tracing_filter(directives: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into());
    match directives.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => builder.parse_lossy(directives),
        None => builder.from_env_lossy(),
    }
}

pub(crate) fn init_tracing(directives: Option<&str>) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_filter(directives))
        .with_target(false)
        .compact()
        .init();
}
