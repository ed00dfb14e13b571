use {
    filelog_rotator::{FileLogSinkBuilder, TimeZone},
    tracing_subscriber::{filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt, Layer},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let appender = FileLogSinkBuilder::new("./logs/tracing.log")
        .max_file_size("1M")
        .time_zone(TimeZone::UTC)
        .build()?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(appender);

    // Keep the sink's own rotation events out of the file it writes.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(filter_fn(|meta| meta.target() != "filelog_rotator"));
    tracing_subscriber::registry()
        .with(file_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    tracing::info!("This is an info message");
    tracing::warn!("This is a warning message");
    tracing::error!("This is an error message");

    Ok(())
}
