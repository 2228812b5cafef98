use anyhow::Result;
use serde_json::{Value, json};
use std::fs;
use visprep::{
    ExtractOptions, ShardRecord, ShardWriter, ShardWriterOptions, run_extract, shard_paths,
};

const PNG_BODY: &[u8] = b"\x89PNG\r\n\x1a\nnot-a-real-png-but-magic-matches";
const JPG_BODY: &[u8] = b"\xFF\xD8\xFF\xE0jfif-ish";

fn write_shard(dir: &std::path::Path, records: Vec<ShardRecord>) -> Result<()> {
    let mut w = ShardWriter::create(dir, ShardWriterOptions::default())?;
    for r in records {
        w.accept(r)?;
    }
    w.finalize()?;
    Ok(())
}

#[test]
fn shards_round_trip_to_images_and_json() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let shard_dir = tmp.path().join("parquets");
    let conversations = json!([{"from": "human", "value": "hi"}]);
    write_shard(
        &shard_dir,
        vec![
            ShardRecord {
                idx: "a".into(),
                image: PNG_BODY.to_vec(),
                conversations: serde_json::to_string(&conversations)?,
                source: "t".into(),
            },
            ShardRecord {
                idx: "b".into(),
                image: JPG_BODY.to_vec(),
                conversations: "[2]".into(),
                source: "t".into(),
            },
        ],
    )?;

    let out_root = tmp.path().join("restored");
    let opts = ExtractOptions {
        shard_dir,
        out_root: out_root.clone(),
        json_out: out_root.join("dataset.json"),
        workers: Some(2),
        progress: false,
    };
    let report = run_extract(&opts)?;
    assert_eq!(report.rows_seen, 2);
    assert_eq!(report.images_written, 2);
    assert_eq!(report.dropped, 0);

    // payload bytes land verbatim, extension from the magic bytes
    assert_eq!(fs::read(out_root.join("images/a.png"))?, PNG_BODY);
    assert_eq!(fs::read(out_root.join("images/b.jpg"))?, JPG_BODY);

    let dataset: Vec<Value> =
        serde_json::from_str(&fs::read_to_string(out_root.join("dataset.json"))?)?;
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset[0]["id"], "a");
    assert_eq!(dataset[0]["image"], "images/a.png");
    assert_eq!(dataset[0]["conversations"], conversations);
    assert_eq!(dataset[1]["image"], "images/b.jpg");
    Ok(())
}

#[test]
fn unrecognizable_payloads_are_dropped() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let shard_dir = tmp.path().join("parquets");
    write_shard(
        &shard_dir,
        vec![
            ShardRecord {
                idx: "good".into(),
                image: PNG_BODY.to_vec(),
                conversations: "[1]".into(),
                source: "t".into(),
            },
            ShardRecord {
                idx: "junk".into(),
                image: vec![0x00, 0x01, 0x02],
                conversations: "[2]".into(),
                source: "t".into(),
            },
        ],
    )?;

    let out_root = tmp.path().join("restored");
    let report = run_extract(&ExtractOptions {
        shard_dir,
        out_root: out_root.clone(),
        json_out: out_root.join("dataset.json"),
        workers: Some(1),
        progress: false,
    })?;
    assert_eq!(report.rows_seen, 2);
    assert_eq!(report.images_written, 1);
    assert_eq!(report.dropped, 1);
    assert!(!out_root.join("images/junk.png").exists());

    let dataset: Vec<Value> =
        serde_json::from_str(&fs::read_to_string(out_root.join("dataset.json"))?)?;
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset[0]["id"], "good");
    Ok(())
}

#[test]
fn empty_shard_directory_is_fatal() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let shard_dir = tmp.path().join("parquets");
    fs::create_dir_all(&shard_dir)?;
    let out_root = tmp.path().join("restored");
    let result = run_extract(&ExtractOptions {
        shard_dir,
        out_root: out_root.clone(),
        json_out: out_root.join("dataset.json"),
        workers: Some(1),
        progress: false,
    });
    assert!(result.is_err());
    Ok(())
}

#[test]
fn shard_paths_lists_in_name_order() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    write_shard(
        tmp.path(),
        vec![ShardRecord {
            idx: "x".into(),
            image: PNG_BODY.to_vec(),
            conversations: "[1]".into(),
            source: "t".into(),
        }],
    )?;
    fs::write(tmp.path().join("notes.txt"), "ignored")?;

    let paths = shard_paths(tmp.path())?;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].file_name().unwrap().to_str().unwrap().ends_with(".parquet"));
    Ok(())
}
