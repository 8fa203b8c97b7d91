//! Generate a calibration record and a session report from synthetic samples

use chrono::{Duration, TimeZone, Utc};
use gazemetry::calibration::standard_targets;
use gazemetry::config::ScreenGeometry;
use gazemetry::schema::RawSample;

fn ratio_for(x: f64, y: f64) -> (f64, f64) {
    (0.30 + 0.40 * x / 1920.0, 0.35 + 0.30 * y / 1080.0)
}

fn to_ndjson(samples: &[RawSample]) -> String {
    samples
        .iter()
        .filter_map(|s| serde_json::to_string(s).ok())
        .collect::<Vec<_>>()
        .join("\n")
}

fn main() {
    let Some(start) = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).single() else {
        return;
    };
    let at = |ms: i64| start + Duration::milliseconds(ms);

    let mut calibration = Vec::new();
    let mut ms = 0;
    for target in standard_targets(&ScreenGeometry::default(), 150) {
        let (h, v) = ratio_for(target.screen_x, target.screen_y);
        for i in 0..10 {
            // A little fixation jitter plus one stray frame per target
            let jitter = if i == 7 { 0.08 } else { (i % 3) as f64 * 0.002 };
            calibration.push(RawSample::with_ratios(at(ms), h + jitter, v - jitter));
            ms += 33;
        }
    }

    // 40 s session, mostly centered, drifting to the lower left every 4 s
    let session: Vec<RawSample> = (0..1200)
        .map(|i| {
            let ts = at(60_000 + i * 33);
            match i % 120 {
                0..=14 => {
                    let (h, v) = ratio_for(180.0, 950.0);
                    RawSample::with_ratios(ts, h, v)
                }
                60..=62 => RawSample::empty(ts).blinking(true),
                _ => {
                    let (h, v) = ratio_for(960.0 + (i % 9) as f64 * 4.0, 540.0);
                    RawSample::with_ratios(ts, h, v)
                }
            }
        })
        .collect();

    let mapping = match gazemetry::pipeline::samples_to_calibration(to_ndjson(&calibration)) {
        Ok(mapping) => mapping,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return;
        }
    };

    match gazemetry::pipeline::samples_to_report(to_ndjson(&session), Some(mapping)) {
        Ok(report) => print!("{report}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
