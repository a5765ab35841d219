// tests/pipeline.rs

//! Integration tests for the depot preparation pipeline.
//!
//! These tests drive the library end to end without the network: a zip
//! bundle on disk through extraction and reconciliation to the artifacts
//! on disk, in both offline and online (stubbed source) configurations.

use depotprep::bundle::load_input;
use depotprep::depot::{DepotId, DepotRecord, DepotRecords, Manifest};
use depotprep::fetch::ManifestSource;
use depotprep::output;
use depotprep::reconcile::{reconcile_offline, reconcile_online};
use depotprep::script::extract;
use depotprep::Error;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const SCRIPT: &str = r#"
-- registration script
addappid(480)
addappid(481, 1, "11111111111111111111111111111111")
addappid(482, 1, "22222222222222222222222222222222")
"#;

/// Build a zip bundle with the script and the given manifest entries
fn write_bundle(path: &Path, manifests: &[(u32, u64)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    writer.start_file("unlock.lua".to_string(), options).unwrap();
    writer.write_all(SCRIPT.as_bytes()).unwrap();
    for &(depot, gid) in manifests {
        writer
            .start_file(format!("{depot}_{gid}.manifest"), options)
            .unwrap();
        writer
            .write_all(format!("bundled:{depot}:{gid}").as_bytes())
            .unwrap();
    }
    writer.finish().unwrap();
}

fn catalog_records(entries: &[(u32, u64)]) -> DepotRecords {
    entries
        .iter()
        .map(|&(id, gid)| {
            (
                DepotId(id),
                DepotRecord {
                    gid,
                    size: 4096,
                    dlc_app_id: None,
                },
            )
        })
        .collect()
}

struct StubSource;

impl ManifestSource for StubSource {
    fn fetch(&self, depot: DepotId, gid: u64) -> depotprep::Result<Manifest> {
        Ok(Manifest {
            gid,
            content: format!("fetched:{depot}:{gid}").into_bytes(),
        })
    }
}

#[test]
fn test_offline_pipeline_from_bundle_to_artifacts() {
    let dir = TempDir::new().unwrap();
    let bundle_path = dir.path().join("app.zip");
    write_bundle(&bundle_path, &[(481, 10), (482, 20)]);

    let input = load_input(&bundle_path).unwrap();
    let (app_id, keys) = extract(&input.script).unwrap();
    assert_eq!(app_id, 480);

    let reconciled = reconcile_offline(keys, input.manifests).unwrap();

    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let keylist = output::write_keylist(&out, app_id, &reconciled.keys).unwrap();
    output::write_manifests(&out, &reconciled.manifests).unwrap();

    assert_eq!(
        std::fs::read_to_string(&keylist).unwrap(),
        "481;11111111111111111111111111111111\n482;22222222222222222222222222222222"
    );
    assert_eq!(
        std::fs::read(out.join("481_10.manifest")).unwrap(),
        b"bundled:481:10"
    );
    assert_eq!(
        std::fs::read(out.join("482_20.manifest")).unwrap(),
        b"bundled:482:20"
    );
}

#[test]
fn test_offline_pipeline_missing_manifest_is_fatal() {
    let dir = TempDir::new().unwrap();
    let bundle_path = dir.path().join("app.zip");
    write_bundle(&bundle_path, &[(481, 10)]);

    let input = load_input(&bundle_path).unwrap();
    let (_, keys) = extract(&input.script).unwrap();

    match reconcile_offline(keys, input.manifests) {
        Err(Error::MissingManifest(depots)) => assert_eq!(depots, vec![DepotId(482)]),
        other => panic!("expected MissingManifest, got {other:?}"),
    }
}

#[test]
fn test_online_pipeline_fetches_missing_and_writes_app_state() {
    let dir = TempDir::new().unwrap();
    let bundle_path = dir.path().join("app.zip");
    // only one of the two keyed depots is bundled
    write_bundle(&bundle_path, &[(481, 10)]);

    let input = load_input(&bundle_path).unwrap();
    let (app_id, keys) = extract(&input.script).unwrap();
    let records = catalog_records(&[(481, 10), (482, 20), (483, 30)]);

    let reconciled =
        reconcile_online(keys, input.manifests, records, Some(&StubSource), false).unwrap();
    assert_eq!(
        reconciled.manifests.keys().copied().collect::<Vec<_>>(),
        vec![DepotId(481), DepotId(482)]
    );
    assert_eq!(reconciled.manifests[&DepotId(481)].content, b"bundled:481:10");
    assert_eq!(reconciled.manifests[&DepotId(482)].content, b"fetched:482:20");

    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    output::write_manifests(&out, &reconciled.manifests).unwrap();

    let app = depotprep::depot::AppRecord {
        app_id,
        name: "Example".to_string(),
        install_dir: "ExampleApp".into(),
        build_id: 7,
    };
    let acf = output::write_app_state(&out, &app, &reconciled.records).unwrap();
    let text = std::fs::read_to_string(&acf).unwrap();
    assert!(text.contains("\"appid\"\t\t\"480\""));
    assert!(text.contains("\"481\""));
    assert!(text.contains("\"482\""));
    // depot 483 had no key and must not appear in the descriptor
    assert!(!text.contains("\"483\""));
}

#[test]
fn test_config_merge_round_trip_preserves_unrelated_sections() {
    let dir = TempDir::new().unwrap();
    let bundle_path = dir.path().join("app.zip");
    write_bundle(&bundle_path, &[(481, 10), (482, 20)]);

    let input = load_input(&bundle_path).unwrap();
    let (_, keys) = extract(&input.script).unwrap();
    let reconciled = reconcile_offline(keys, input.manifests).unwrap();

    let config = dir.path().join("config.vdf");
    std::fs::write(
        &config,
        concat!(
            "\"InstallConfigStore\"\n{\n",
            "\t\"Software\"\n\t{\n",
            "\t\t\"valve\"\n\t\t{\n",
            "\t\t\t\"Steam\"\n\t\t\t{\n",
            "\t\t\t\t\"Accounts\"\n\t\t\t\t{\n\t\t\t\t}\n",
            "\t\t\t\t\"depots\"\n\t\t\t\t{\n\t\t\t\t}\n",
            "\t\t\t}\n\t\t}\n\t}\n}\n"
        ),
    )
    .unwrap();

    let backup = output::merge_config(&config, &reconciled.keys).unwrap();
    assert!(backup.is_file());

    let merged = std::fs::read_to_string(&config).unwrap();
    assert!(merged.contains("\"Accounts\""));
    assert!(merged.contains("\"481\""));
    assert!(merged.contains("\"11111111111111111111111111111111\""));

    // merging again is a no-op apart from the refreshed backup
    output::merge_config(&config, &reconciled.keys).unwrap();
    assert_eq!(std::fs::read_to_string(&config).unwrap(), merged);
}
