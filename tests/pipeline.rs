//! End-to-end pipeline test: captured files through the demultiplexer
//! into buckets and lap times in one pass.

use laptrace_core::core::protocol::{nmea, ubx};
use laptrace_core::{BucketedSink, SectorMap, TimingEngine};

/// Rectangular test circuit near (0°, 0°): pre-finish sector west of
/// the finish line, post-finish east, auxiliary sectors parked south.
fn track_json() -> String {
    let m = 1.0 / 111_320.0; // ~1 meter of longitude at the equator
    let aux = r#""coordinates": [[[0.0, -0.00018], [0.0018, -0.00018], [0.0018, -0.00009], [0.0, -0.00009], [0.0, -0.00018]]]"#;
    format!(
        r#"{{
  "type": "FeatureCollection",
  "features": [
    {{"properties": {{"name": "Track"}}, "geometry": {{"type": "Polygon",
      "coordinates": [[[0.0, 0.0], [{e}, 0.0], [{e}, {n}], [0.0, {n}], [0.0, 0.0]]]}}}},
    {{"properties": {{"name": "PreFinish_Sector"}}, "geometry": {{"type": "Polygon",
      "coordinates": [[[0.0, 0.0], [{mid}, 0.0], [{mid}, {n}], [0.0, {n}], [0.0, 0.0]]]}}}},
    {{"properties": {{"name": "PostFinish_Sector"}}, "geometry": {{"type": "Polygon",
      "coordinates": [[[{mid}, 0.0], [{e}, 0.0], [{e}, {n}], [{mid}, {n}], [{mid}, 0.0]]]}}}},
    {{"properties": {{"name": "Pitlane"}}, "geometry": {{"type": "Polygon", {aux}}}}},
    {{"properties": {{"name": "Pitlane_Gates"}}, "geometry": {{"type": "Polygon", {aux}}}}},
    {{"properties": {{"name": "Pitlane_entry"}}, "geometry": {{"type": "Polygon", {aux}}}}},
    {{"properties": {{"name": "Pitlane_Exit"}}, "geometry": {{"type": "Polygon", {aux}}}}},
    {{"properties": {{"name": "Paddock"}}, "geometry": {{"type": "Polygon", {aux}}}}},
    {{"properties": {{"name": "Opposite_Marker"}}, "geometry": {{"type": "Polygon", {aux}}}}},
    {{"properties": {{"name": "Finish_Line"}}, "geometry": {{"type": "LineString",
      "coordinates": [[{mid}, 0.0], [{mid}, {n}]]}}}}
  ]
}}"#,
        e = 200.0 * m,
        mid = 100.0 * m,
        n = 100.0 / 111_319.0,
        aux = aux,
    )
}

/// RMC sentence at `meters` east of the origin, 50 m north
fn rmc_at(time: &str, meters: f64) -> Vec<u8> {
    let lon_min = meters / 111_320.0 * 60.0;
    let lat_min = 50.0 / 111_319.0 * 60.0;
    let body =
        format!("GPRMC,{time},A,00{lat_min:08.5},N,000{lon_min:08.5},E,20.0,90.0,310121,,");
    format!("${}*{:02X}\r\n", body, nmea::checksum(body.as_bytes())).into_bytes()
}

#[test]
fn test_captured_session_yields_buckets_and_laps() {
    let log_dir = tempfile::tempdir().unwrap();
    let bucket_dir = tempfile::tempdir().unwrap();

    // Two capture files as rotation would leave them: a lap straddling
    // the file boundary, UBX frames interleaved, junk bytes in between.
    let mut first = Vec::new();
    first.extend_from_slice(&ubx::encode(0x01, 0x07, &[0; 16]));
    first.extend_from_slice(&rmc_at("143958.00", 60.0)); // pre, crossing 1
    first.extend_from_slice(&[0xFF, 0x00]); // line noise
    first.extend_from_slice(&rmc_at("144000.00", 140.0)); // post, crossing at 14:39:59.00

    let mut second = Vec::new();
    second.extend_from_slice(&rmc_at("144133.32", 80.0)); // pre, crossing 2
    second.extend_from_slice(&ubx::encode(0x02, 0x13, &[1, 2, 3]));
    second.extend_from_slice(&rmc_at("144135.32", 120.0)); // post, crossing at 14:41:34.32

    std::fs::write(
        log_dir.path().join("gps-log-1-0-2021-01-31T14.35.txt"),
        &first,
    )
    .unwrap();
    std::fs::write(
        log_dir.path().join("gps-log-1-1-2021-01-31T14.40.txt"),
        &second,
    )
    .unwrap();

    let map = SectorMap::from_json(&track_json()).unwrap();
    let mut engine = TimingEngine::new(&map, Vec::new());
    let mut buckets = BucketedSink::new(bucket_dir.path());

    let stats =
        laptrace_core::replay_directory(log_dir.path(), &mut [&mut buckets, &mut engine]).unwrap();
    drop(buckets);

    assert_eq!(stats.ubx_frames, 2);
    assert_eq!(stats.nmea_sentences, 4);
    assert_eq!(stats.resyncs, 2);

    // one lap between the interpolated crossings at 14:39:59.00 and
    // 14:41:34.32
    assert_eq!(engine.laps().len(), 1);
    assert!((engine.laps()[0].duration_seconds - 95.32).abs() < 1e-6);
    let out = String::from_utf8(engine.into_inner().unwrap()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "----------");
    assert_eq!(lines[1], "14:41:34 1:35.32");

    // bucket files keyed by GPS time, not capture file names
    let mut names: Vec<String> = std::fs::read_dir(bucket_dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "gps-log-2021-01-31T14.35.bin".to_string(),
            "gps-log-2021-01-31T14.40.bin".to_string(),
            "gps-log-unkeyed.bin".to_string(),
        ]
    );

    // every validated frame lands in exactly one bucket, junk in none
    let total: usize = names
        .iter()
        .map(|n| std::fs::read(bucket_dir.path().join(n)).unwrap().len())
        .sum();
    assert_eq!(total, first.len() + second.len() - 2);
}
