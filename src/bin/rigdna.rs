use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rigdna", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary (or full JSON) of a DNA file.
    Inspect(InspectArgs),
    /// Parse a DNA file, re-serialize it, and check the bytes round-trip.
    Verify(VerifyArgs),
    /// Evaluate one tick of the behavior graph and print non-zero outputs.
    Eval(EvalArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input DNA file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Dump the whole document as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    /// Input DNA file.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct EvalArgs {
    /// Input DNA file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Control assignment `name=value`; repeatable.
    #[arg(long = "set")]
    set: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
        Command::Verify(args) => cmd_verify(args),
        Command::Eval(args) => cmd_eval(args),
    }
}

fn read_document(path: &Path) -> anyhow::Result<rigdna::DnaDocument> {
    rigdna::DnaDocument::from_file(path)
        .with_context(|| format!("load DNA '{}'", path.display()))
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let doc = read_document(&args.in_path)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("rig:            {}", doc.name());
    println!("joints:         {}", doc.joints().len());
    for (i, lod) in doc.lods().iter().enumerate() {
        println!(
            "LOD {i}:          {} vertices, {} triangles, {}",
            lod.positions.len(),
            lod.triangles.len(),
            if lod.uvs.is_empty() {
                "no UV chart"
            } else {
                "UV chart"
            }
        );
    }
    println!("shape channels: {}", doc.blend_shape_channels().len());
    println!("shape targets:  {}", doc.blend_shape_targets().len());
    println!("animated maps:  {}", doc.animated_maps().len());
    let behavior = doc.behavior();
    println!("controls:       {}", behavior.controls.len());
    println!("PSD exprs:      {}", behavior.psd_expressions.len());
    println!("RBF solvers:    {}", behavior.rbf_solvers.len());
    println!(
        "behaviors:      {} joint, {} blend-shape, {} animated-map",
        behavior.joint_behaviors.len(),
        behavior.blend_shape_behaviors.len(),
        behavior.animated_map_behaviors.len()
    );
    if let Some(mode) = doc.metadata().calibrated_with {
        println!(
            "calibrated:     {mode:?} ({} low-confidence vertices)",
            doc.metadata().low_confidence.len()
        );
    }
    Ok(())
}

fn cmd_verify(args: VerifyArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read '{}'", args.in_path.display()))?;
    let doc = rigdna::DnaDocument::from_bytes(&bytes).context("parse DNA")?;
    let rewritten = doc.to_bytes().context("re-serialize DNA")?;
    if bytes != rewritten {
        anyhow::bail!(
            "round-trip mismatch: {} bytes in, {} bytes out",
            bytes.len(),
            rewritten.len()
        );
    }
    eprintln!("{}: ok ({} bytes)", args.in_path.display(), bytes.len());
    Ok(())
}

fn cmd_eval(args: EvalArgs) -> anyhow::Result<()> {
    let doc = read_document(&args.in_path)?;
    let rig = rigdna::RigLogic::new(&doc).context("compile behavior graph")?;
    let mut instance = rig.instance();

    for assignment in &args.set {
        let (name, value) = assignment
            .split_once('=')
            .with_context(|| format!("expected name=value, got '{assignment}'"))?;
        let index = rig
            .control_index(name)
            .with_context(|| format!("unknown control '{name}'"))?;
        instance.set_control(index, value.parse::<f32>()?);
    }

    let outputs = instance.evaluate(&rig);

    for (i, joint) in doc.joints().iter().enumerate() {
        let delta = &outputs.joint_deltas[i];
        if delta != &rigdna::JointDelta::default() {
            println!(
                "joint {:<24} t=({:+.4}, {:+.4}, {:+.4}) r=({:+.2}, {:+.2}, {:+.2}) s=({:+.4}, {:+.4}, {:+.4})",
                joint.name,
                delta.translation[0],
                delta.translation[1],
                delta.translation[2],
                delta.rotation[0],
                delta.rotation[1],
                delta.rotation[2],
                delta.scale[0],
                delta.scale[1],
                delta.scale[2],
            );
        }
    }
    for (i, channel) in doc.blend_shape_channels().iter().enumerate() {
        let w = outputs.blend_shape_weights[i];
        if w != 0.0 {
            println!("shape {:<25} {w:.4}", channel.name);
        }
    }
    for (i, map) in doc.animated_maps().iter().enumerate() {
        let w = outputs.animated_map_weights[i];
        if w != 0.0 {
            println!("map {:<27} {w:.4}", map.name);
        }
    }
    Ok(())
}
