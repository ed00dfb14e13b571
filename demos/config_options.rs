use filelog_rotator::{FileLogSink, SinkOptions};

const CONFIG: &str = r#"{
    "file": "./logs/configured.log",
    "isFileRotationEnabled": true,
    "maxFileSize": "64K",
    "rotatedFileFormat": "{fileName}-{dateTime}-{number}.{extension}",
    "zipRotatedFiles": true
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options: SinkOptions = serde_json::from_str(CONFIG)?;
    let sink = FileLogSink::try_from(options)?;

    for i in 1..=5_000 {
        sink.listen(&format!("request {i} served"), "http")?;
    }
    println!("{} rotations", sink.sequence_number());

    Ok(())
}
