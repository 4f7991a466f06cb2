//! Turntable CLI - model inspection and module census

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use turntable_core::config::{load_config, save_default_config};
use turntable_core::{Census, ModelFormat, ModelLoader, ModuleTable, NodeKind, SceneNode};

#[derive(Parser, Debug)]
#[command(name = "turntable")]
#[command(about = "Inspect 3D models and take a census of a module table")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, default_value = "turntable.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a model and print its node tree
    Inspect {
        /// Local path, file:// URI, or http(s) URL
        locator: String,

        /// Model format (gltf, obj, fbx, json)
        #[arg(short, long)]
        format: ModelFormat,
    },

    /// Partition a module table into loaded and waiting modules
    Census {
        /// JSON module table, or - for stdin
        table: String,

        /// Also print the modules still waiting to initialize
        #[arg(long)]
        waiting: bool,
    },

    /// Write a configuration file with every default filled in
    InitConfig {
        #[arg(default_value = "turntable.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so the census literal can be piped
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Inspect { locator, format } => {
            let config = load_config(&args.config)
                .with_context(|| format!("Failed to load config {}", args.config.display()))?;
            let loader = ModelLoader::new(&config.fetch).context("Failed to create HTTP client")?;
            let node = loader
                .load(&locator, format)
                .await
                .with_context(|| format!("Failed to load {} as {}", locator, format))?;
            print!("{}", render_tree(&node));
        }
        Command::Census { table, waiting } => {
            let json = read_table(&table).await?;
            let table = ModuleTable::from_json(&json).context("Invalid module table")?;
            let census = Census::take(&table);
            census.log_summary();
            print!("{}", census_report(&census, waiting)?);
        }
        Command::InitConfig { path } => {
            save_default_config(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Default configuration written");
        }
    }

    Ok(())
}

async fn read_table(source: &str) -> Result<String> {
    if source == "-" {
        let mut json = String::new();
        tokio::io::stdin()
            .read_to_string(&mut json)
            .await
            .context("Failed to read module table from stdin")?;
        Ok(json)
    } else {
        tokio::fs::read_to_string(source)
            .await
            .with_context(|| format!("Failed to read module table {}", source))
    }
}

fn kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Scene => "scene",
        NodeKind::Group => "group",
        NodeKind::Mesh => "mesh",
    }
}

/// Indented node tree followed by totals
fn render_tree(root: &SceneNode) -> String {
    let mut out = String::new();
    root.walk(&mut |node, depth| {
        let _ = write!(out, "{}{} [{}]", "  ".repeat(depth), node.name, kind_label(node.kind));
        if !node.meshes.is_empty() {
            let vertices: usize = node.meshes.iter().map(|m| m.vertex_count()).sum();
            let triangles: usize = node.meshes.iter().map(|m| m.triangle_count()).sum();
            let _ = write!(
                out,
                " meshes={} vertices={} triangles={}",
                node.meshes.len(),
                vertices,
                triangles
            );
        }
        out.push('\n');
    });
    let _ = writeln!(
        out,
        "{} nodes, {} meshes, {} vertices, {} triangles",
        root.node_count(),
        root.mesh_count(),
        root.vertex_count(),
        root.triangle_count()
    );
    out
}

fn census_report(census: &Census, waiting: bool) -> Result<String> {
    let mut out = census.exports_literal()?;
    out.push('\n');
    if waiting {
        out.push_str("\nwaiting:\n");
        for name in &census.waiting {
            let _ = writeln!(out, "  {}", name);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use turntable_core::MeshData;

    fn triangle() -> MeshData {
        MeshData::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_render_tree() {
        let root = SceneNode::new("Scene", NodeKind::Scene).with_child(
            SceneNode::new("Body", NodeKind::Group)
                .with_child(SceneNode::new("Hull", NodeKind::Mesh).with_mesh(triangle())),
        );

        assert_eq!(
            render_tree(&root),
            "Scene [scene]\n  Body [group]\n    Hull [mesh] meshes=1 vertices=3 triangles=1\n\
             3 nodes, 1 meshes, 3 vertices, 1 triangles\n"
        );
    }

    #[test]
    fn test_census_report() {
        let table = ModuleTable::from_json(
            r#"{ "0": { "isInitialized": true, "verboseName": "A" },
                 "1": { "isInitialized": false, "verboseName": "B" },
                 "2": { "isInitialized": true, "verboseName": "C" } }"#,
        )
        .unwrap();
        let census = Census::take(&table);

        assert_eq!(
            census_report(&census, false).unwrap(),
            "module.exports = [\n  \"A\",\n  \"C\"\n];\n"
        );
        assert!(census_report(&census, true)
            .unwrap()
            .ends_with("\nwaiting:\n  B\n"));
    }

    #[tokio::test]
    async fn test_read_table_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("modules.json");
        std::fs::write(&path, "{}").unwrap();

        let json = read_table(&path.to_string_lossy()).await.unwrap();
        assert_eq!(json, "{}");
        assert!(read_table(&temp_dir.path().join("missing.json").to_string_lossy())
            .await
            .is_err());
    }
}
