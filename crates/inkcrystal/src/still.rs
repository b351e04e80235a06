use std::time::Duration;

use anyhow::{Context, Result};
use renderer::{render_still, FrameParams, SourcePair};

use crate::cli::StillArgs;

/// Renders one CPU frame and writes it as PNG.
pub fn run_still(args: StillArgs) -> Result<()> {
    let sources = SourcePair::new(args.old, args.new);
    let mut params = FrameParams::still(args.state, args.time, args.slider, args.size);
    if let Some(progress) = args.progress {
        params = params.with_progress(progress);
    }
    tracing::info!(
        state = %args.state,
        width = args.size.0,
        height = args.size.1,
        progress = params.progress,
        "rendering still frame"
    );

    let frame = render_still(&sources, &params, Duration::from_secs(args.timeout))?;
    frame
        .save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    tracing::info!(out = %args.out.display(), "still frame written");
    Ok(())
}
