//! Resolve a layered terrain tileset and fetch one tile.
//!
//! Prints the resolved layers, their credits and a summary of the decoded
//! tile. Useful for checking a tileset without a renderer.

use std::process::ExitCode;

use clap::Parser;
use terrain::{
    Availability, TerrainProvider, TerrainProviderOptions, TerrainTileData, TileResponse,
};

#[derive(Parser)]
#[command(about = "Fetch a tile from a layered terrain tileset")]
struct CliArgs {
    /// Base URL of the tileset (the directory holding `layer.json`).
    url: String,

    /// Tile level.
    #[arg(default_value_t = 0)]
    level: u32,

    /// Tile column.
    #[arg(default_value_t = 0)]
    x: u32,

    /// Tile row, counted from the north.
    #[arg(default_value_t = 0)]
    y: u32,

    /// Request vertex normals.
    #[arg(long)]
    normals: bool,

    /// Request the water mask.
    #[arg(long)]
    water_mask: bool,

    /// Skip the metadata extension.
    #[arg(long)]
    no_metadata: bool,

    /// Extra credit to display.
    #[arg(long)]
    credit: Option<String>,

    /// Maximum number of layers in the parent chain.
    #[arg(long, default_value_t = 5)]
    max_depth: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> terrain::Result<()> {
    let mut options = TerrainProviderOptions::new(args.url)
        .with_vertex_normals(args.normals)
        .with_water_mask(args.water_mask)
        .with_metadata(!args.no_metadata)
        .with_max_layer_depth(args.max_depth);
    if let Some(credit) = args.credit {
        options = options.with_credit(credit);
    }

    let provider = TerrainProvider::new(options);
    provider.ready().await?;

    for (index, layer) in provider.layers()?.iter().enumerate() {
        println!(
            "layer {index}: {} ({}, {} templates, max level {})",
            layer.url,
            layer.format,
            layer.url_templates.len(),
            layer
                .max_level
                .map_or_else(|| "unbounded".to_owned(), |level| level.to_string()),
        );
    }
    for credit in provider.credit().into_iter().chain(provider.credits()?.iter()) {
        println!("credit: {credit}");
    }
    println!(
        "extensions: normals={} water_mask={} metadata={}",
        provider.has_vertex_normals()?,
        provider.has_water_mask()?,
        provider.has_metadata()?,
    );

    let (level, x, y) = (args.level, args.x, args.y);
    let availability = provider.tile_availability(level, x, y)?;
    println!(
        "tile {level}/{x}/{y}: {availability:?}, geometric error {:.2} m",
        provider.get_level_maximum_geometric_error(level)
    );
    if availability == Availability::Unavailable {
        return Ok(());
    }

    let handle = match provider.request_tile_geometry(level, x, y)? {
        TileResponse::Pending(handle) => handle,
        TileResponse::NoCapacity => {
            println!("server is at capacity, try again later");
            return Ok(());
        }
        TileResponse::Unavailable => {
            println!("no layer has this tile");
            return Ok(());
        }
    };
    println!("fetching {}", handle.url());

    let tile = handle.await?;
    print_tile(&tile);
    Ok(())
}

fn print_tile(tile: &TerrainTileData) {
    match tile {
        TerrainTileData::QuantizedMesh(data) => {
            let mesh = &data.mesh;
            println!(
                "quantized mesh: {} vertices, {} triangles, heights {:.1}..{:.1} m",
                mesh.vertex_count(),
                mesh.triangle_count(),
                mesh.header.minimum_height,
                mesh.header.maximum_height,
            );
            println!(
                "edges: west {} south {} east {} north {}",
                mesh.west_indices.len(),
                mesh.south_indices.len(),
                mesh.east_indices.len(),
                mesh.north_indices.len(),
            );
            println!("normals: {}", mesh.encoded_normals.is_some());
            println!(
                "bounding box extents: {:.1}",
                data.oriented_bounding_box.extents
            );
        }
        TerrainTileData::Heightmap(data) => {
            println!(
                "heightmap: {}x{} samples",
                data.heightmap.width, data.heightmap.height
            );
        }
    }
    println!("child tile mask: {:04b}", tile.child_tile_mask());
    if let Some(mask) = tile.water_mask() {
        println!("water mask: uniform={}", mask.is_uniform());
    }
}
