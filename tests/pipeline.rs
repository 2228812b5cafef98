use anyhow::Result;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use visprep::{ConvertOptions, read_shard_records, run_convert, shard_paths};

/// Five entries; the ones at positions 2 and 4 point at images that do not
/// exist on disk.
fn seed_dataset(root: &Path) -> Result<Vec<Value>> {
    let images = root.join("images");
    fs::create_dir_all(&images)?;
    let mut entries = Vec::new();
    for i in 0..5 {
        if i != 2 && i != 4 {
            fs::write(
                images.join(format!("img{i}.jpg")),
                [0xFF, 0xD8, 0xFF, i as u8],
            )?;
        }
        entries.push(json!({
            "id": format!("e{i}"),
            "image": format!("img{i}.jpg"),
            "conversations": [{"from": "human", "value": format!("q{i}")}]
        }));
    }
    Ok(entries)
}

fn convert(root: &Path, input: &Path, out: &Path) -> Result<visprep::ConvertReport> {
    let mut opts = ConvertOptions::new(input, root.join("images"), out);
    opts.records_per_shard = 2;
    opts.workers = Some(2);
    opts.source_tag = "test_set".to_string();
    run_convert(&opts)
}

#[test]
fn five_entries_two_bad_threshold_two_yields_two_shards() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let entries = seed_dataset(tmp.path())?;
    let input = tmp.path().join("meta.json");
    fs::write(&input, serde_json::to_string(&entries)?)?;
    let out = tmp.path().join("parquets");

    let report = convert(tmp.path(), &input, &out)?;
    assert_eq!(report.entries_seen, 5);
    assert_eq!(report.records_written, 3);
    assert_eq!(report.dropped, 2);
    assert_eq!(report.shards_written, 2);

    // rename pass already ran: names carry the total
    let shards = shard_paths(&out)?;
    let names: Vec<_> = shards
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["part_0000_of_0002.parquet", "part_0001_of_0002.parquet"]
    );

    // shard sizes 2 and 1, records in input order with drops absent
    let first = read_shard_records(&shards[0])?;
    let second = read_shard_records(&shards[1])?;
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    let ids: Vec<_> = first
        .iter()
        .chain(second.iter())
        .map(|r| r.idx.clone())
        .collect();
    assert_eq!(ids, vec!["e0", "e1", "e3"]);

    // payloads and dialogue round-trip
    assert_eq!(first[0].image, vec![0xFF, 0xD8, 0xFF, 0]);
    assert_eq!(first[0].source, "test_set");
    let back: Value = serde_json::from_str(&first[0].conversations)?;
    assert_eq!(back, json!([{"from": "human", "value": "q0"}]));
    Ok(())
}

#[test]
fn jsonl_with_blank_line_matches_array_input() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let entries = seed_dataset(tmp.path())?;

    let array_input = tmp.path().join("meta.json");
    fs::write(&array_input, serde_json::to_string(&entries)?)?;

    let mut jsonl = String::new();
    for (i, e) in entries.iter().enumerate() {
        jsonl.push_str(&serde_json::to_string(e)?);
        jsonl.push('\n');
        if i == 1 {
            jsonl.push('\n'); // blank line between records
        }
    }
    let jsonl_input = tmp.path().join("meta.jsonl");
    fs::write(&jsonl_input, jsonl)?;

    let out_a = tmp.path().join("out_array");
    let out_l = tmp.path().join("out_lines");
    let report_a = convert(tmp.path(), &array_input, &out_a)?;
    let report_l = convert(tmp.path(), &jsonl_input, &out_l)?;
    assert_eq!(report_a, report_l);

    let rows_a: Vec<_> = shard_paths(&out_a)?
        .iter()
        .map(read_shard_records)
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();
    let rows_l: Vec<_> = shard_paths(&out_l)?
        .iter()
        .map(read_shard_records)
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(rows_a, rows_l);
    Ok(())
}

#[test]
fn total_records_across_shards_equals_eligible_count() -> Result<()> {
    let tmp = tempfile::tempdir()?;
    let images = tmp.path().join("images");
    fs::create_dir_all(&images)?;

    // 20 entries, every third one ineligible (missing conversations)
    let mut entries = Vec::new();
    let mut eligible = 0usize;
    for i in 0..20 {
        fs::write(images.join(format!("i{i}.png")), b"\x89PNG\r\n\x1a\nx")?;
        if i % 3 == 0 {
            entries.push(json!({"id": format!("x{i}"), "image": format!("i{i}.png")}));
        } else {
            entries.push(
                json!({"id": format!("x{i}"), "image": format!("i{i}.png"), "conversations": [i]}),
            );
            eligible += 1;
        }
    }
    let input = tmp.path().join("meta.json");
    fs::write(&input, serde_json::to_string(&entries)?)?;

    let out = tmp.path().join("parquets");
    let mut opts = ConvertOptions::new(&input, &images, &out);
    opts.records_per_shard = 4;
    opts.workers = Some(4);
    let report = run_convert(&opts)?;

    assert_eq!(report.records_written, eligible);
    let total: usize = shard_paths(&out)?
        .iter()
        .map(read_shard_records)
        .collect::<Result<Vec<_>>>()?
        .iter()
        .map(Vec::len)
        .sum();
    assert_eq!(total, eligible);
    Ok(())
}

#[test]
fn missing_input_aborts() {
    let opts = ConvertOptions::new("/nonexistent/meta.json", "/tmp", "/tmp/out-none");
    assert!(run_convert(&opts).is_err());
}
