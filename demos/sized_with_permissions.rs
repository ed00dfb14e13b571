use filelog_rotator::{FileLogSinkBuilder, RotationSize, SequenceSeed};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = FileLogSinkBuilder::new("./logs/sized.log")
        .max_size(RotationSize::MB(1)) // Rotate at 1MB
        .archive_name_format("{fileName}.{number}.{extension}")
        .sequence_seed(SequenceSeed::ScanArchives) // Continue numbering across restarts
        .max_keep_files(5) // Keep only last 5 archives
        .file_mode(0o640) // Set file permissions to: owner rw, group r, others none
        .cross_process_lock(true)
        .build()?;

    // Simulate writing logs that will trigger size-based rotation
    for i in 1..=20_000 {
        let outcome = sink.write(&format!(
            "Log entry #{}: This is a sample log message that will contribute to file size",
            i
        ))?;
        if let Some(record) = outcome.archive() {
            println!("archived #{} -> {}", record.sequence_number, record.destination_path.display());
        }
    }

    Ok(())
}
