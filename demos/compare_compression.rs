use {
    filelog_rotator::{Compression, FileLogSink, FileLogSinkBuilder, SinkError},
    std::time::Instant,
};

const LOG_FOLDER: &str = "./logs/compression";

/// Very dependant on log pattern, On random pattern data might not be worth using compression
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    #[allow(unused_mut)]
    let mut codecs = vec![("plain", None), ("zip", Some(Compression::Zip)), ("gzip", Some(Compression::Gzip))];
    #[cfg(feature = "xz")]
    codecs.push(("xz", Some(Compression::XZ)));
    #[cfg(not(feature = "xz"))]
    println!("XZ compression skipped. Enable 'xz' feature to include it.");

    for (label, compression) in codecs {
        let builder = FileLogSinkBuilder::new(format!("{LOG_FOLDER}/{label}.log"))
            .max_file_size("1M")
            .archive_name_format("{fileName}.{number}.{extension}")
            .max_keep_files(2);
        let sink = match compression {
            Some(compression) => builder.compression(compression),
            None => builder.no_compression(),
        }
        .build()?;

        // Simulate writing logs that will trigger size-based rotation
        writing_log(&sink)?;
        std::fs::remove_file(sink.config().file_path())?;
    }

    println!("Done Compressing: {:?}", start.elapsed());
    println!("File | Compression percentage | Bytes");
    for i in std::fs::read_dir(LOG_FOLDER)?.flatten() {
        let size = std::fs::metadata(i.path()).map_or(0, |m| m.len());
        println!(
            "{:?} : {:.2}% : {:?} Bytes",
            i.file_name(),
            size as f64 * 100.0 / (1024.0 * 1024.0),
            size
        );
    }

    Ok(())
}

/// This is log example, Compression rate will differ with log patterns.
fn writing_log(sink: &FileLogSink) -> Result<(), SinkError> {
    for i in 1..=35_000 {
        sink.write(&format!(
            "Log entry #{i}: This is a sample log message that will contribute to file size"
        ))?;
    }
    Ok(())
}
