use filelog_rotator::FileLogSinkBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = FileLogSinkBuilder::new("./logs/logger.log")
        .max_file_size("256K")
        .archive_name_format("{fileName}.{number}.{extension}")
        .max_keep_files(3)
        .build()?;

    sink.write("This is an info message")?;
    sink.write("This is a warning message")?;
    sink.listen("This is an error message", "app")?;

    Ok(())
}
