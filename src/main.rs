//! Curve Codec CLI - Compress, validate and sample curve sets stored as JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use curve_codec::{
    animation::{CompressedCurves, CompressionInput, CurveCompressionCodec},
    schema::{AnimationCurve, CodecSettings, CurveKey, KeyedCurve, MorphTarget, MorphTargetSet},
};

/// Curves of one animation sequence, as read by `compress`.
#[derive(Debug, Serialize, Deserialize)]
struct CurveSetFile {
    asset_name: String,
    sequence_length: f32,
    num_samples: u32,
    curves: Vec<AnimationCurve>,
    #[serde(default)]
    morph_targets: Option<MorphTargetSet>,
    #[serde(default)]
    settings: CodecSettings,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_input();
        return;
    }

    match args.get(1).map(String::as_str) {
        Some("compress") if args.len() >= 4 => {
            compress(PathBuf::from(&args[2]), PathBuf::from(&args[3]));
        }
        Some("validate") if args.len() >= 3 => {
            validate(PathBuf::from(&args[2]));
        }
        Some("sample") if args.len() >= 4 => {
            let time: f32 = args[3].parse().unwrap_or_else(|e| {
                eprintln!("Invalid time '{}': {}", args[3], e);
                std::process::exit(1);
            });
            sample(PathBuf::from(&args[2]), time, args.get(4).map(String::as_str));
        }
        _ => {
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!();
    eprintln!("Compress scalar animation curves with a per-curve error bound.");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  compress <curves.json> <output.json>   Compress a curve set");
    eprintln!("  validate <output.json>                 Check compressed curves");
    eprintln!("  sample <output.json> <time> [curve]    Sample curves at a time in seconds");
    eprintln!();
    eprintln!("Example input is generated with --example flag.");
}

fn compress(input_path: PathBuf, output_path: PathBuf) {
    let input_str = fs::read_to_string(&input_path).unwrap_or_else(|e| {
        eprintln!("Error reading curve file: {}", e);
        std::process::exit(1);
    });

    let input: CurveSetFile = serde_json::from_str(&input_str).unwrap_or_else(|e| {
        eprintln!("Error parsing curve file: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = input.settings.validate() {
        eprintln!("Invalid settings: {}", e);
        std::process::exit(1);
    }

    println!("Curve Compression");
    println!("=================");
    println!("Asset: {}", input.asset_name);
    println!("Curves: {}", input.curves.len());
    println!(
        "Sequence: {:.3}s, {} samples",
        input.sequence_length, input.num_samples
    );
    println!(
        "Precision: {} (morph targets: {})",
        input.settings.curve_precision, input.settings.morph_target_position_precision
    );
    println!();

    let codec = CurveCompressionCodec::new(input.settings);
    let start = Instant::now();
    let compressed = codec.compress(&CompressionInput {
        asset_name: &input.asset_name,
        curves: &input.curves,
        sequence_length: input.sequence_length,
        num_samples: input.num_samples,
        morph_targets: input.morph_targets.as_ref(),
    });
    let elapsed = start.elapsed();

    let stats = codec.stats(&compressed, input.num_samples);
    println!("Compressed in {:.2?}: {}", elapsed, stats);
    println!(
        "Cache key: {}",
        codec.cache_key(input.morph_targets.as_ref())
    );

    if let Err(e) = compressed.save(&output_path) {
        eprintln!("Error writing {}: {}", output_path.display(), e);
        std::process::exit(1);
    }
    println!("Wrote {}", output_path.display());

    if compressed.did_fallback {
        eprintln!("Compression fell back to identity curves; see log for details.");
        std::process::exit(2);
    }
}

fn load(path: &Path) -> CompressedCurves {
    CompressedCurves::load(path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        std::process::exit(1);
    })
}

fn validate(path: PathBuf) {
    let compressed = load(&path);
    let codec = CurveCompressionCodec::default();
    let asset_name = path.display().to_string();

    if codec.validate(&compressed, &asset_name) {
        println!(
            "{}: valid ({} curves, {} bytes)",
            asset_name,
            compressed.num_curves(),
            compressed.compressed_bytes.len()
        );
    } else {
        eprintln!("{}: invalid", asset_name);
        std::process::exit(1);
    }
}

fn sample(path: PathBuf, time: f32, curve: Option<&str>) {
    let compressed = load(&path);
    let codec = CurveCompressionCodec::default();

    match curve {
        Some(name) => {
            println!("{} = {:.6}", name, codec.decompress_one(&compressed, name, time));
        }
        None => {
            for (name, value) in codec.decompress_all(&compressed, time) {
                println!("{} = {:.6}", name, value);
            }
        }
    }
}

fn print_example_input() {
    let jaw_keys = vec![
        CurveKey::cubic(0.0, 0.0, 0.0, 0.0),
        CurveKey::cubic(0.5, 1.0, 0.0, 0.0),
        CurveKey::cubic(1.0, 0.0, 0.0, 0.0),
    ];

    let example = CurveSetFile {
        asset_name: "face_anim".to_string(),
        sequence_length: 1.0,
        num_samples: 31,
        curves: vec![
            AnimationCurve::new("jaw_open", KeyedCurve::new(jaw_keys)),
            AnimationCurve::new("param", KeyedCurve::constant(0.5)),
        ],
        morph_targets: Some(MorphTargetSet {
            structure_guid: Some("5f1c9a2e-0d7b-4c3e-9a61-2b8f4e7d1c30".to_string()),
            targets: vec![MorphTarget::new(
                "jaw_open",
                vec![vec![[0.0, -1.2, 0.4], [0.0, -3.0, 0.0]]],
            )],
        }),
        settings: CodecSettings::default(),
    };

    match serde_json::to_string_pretty(&example) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing example: {}", e);
            std::process::exit(1);
        }
    }
}
