use super::{FadeOutcome, FadeTarget, Step, StepReport};
use crate::error::{PluginError, Result};
use crate::event::Settings;
use crate::obs::{SceneItem, SceneRemote};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Time the overlay is shown before the scene switch.
pub const PRE_ROLL: Duration = Duration::from_millis(1000);

/// Time allowed for the scene transition before the overlay is hidden.
///
/// OBS answers `SetCurrentProgramScene` before the transition has finished and
/// no event subscription is held, so this stays a fixed wait.
pub const SETTLE: Duration = Duration::from_millis(1500);

/// Fade the configured item across a switch to the configured scene.
///
/// The lookups run first and any failure there aborts before anything is
/// changed in OBS. After that, each step's failure is recorded in the outcome
/// and the remaining steps still run.
///
/// # Errors
/// Returns `MissingSetting` for incomplete settings, `ItemNotFound` when the
/// item cannot be resolved in either scene, or the remote error of a lookup.
pub async fn execute(remote: &dyn SceneRemote, settings: &Settings) -> Result<FadeOutcome> {
    let target = FadeTarget::from_settings(settings)?;

    let original_scene = remote.current_scene().await?;

    let target_items = remote.scene_items(&target.scene).await?;
    let name = find_item(&target_items, &target.scene, &target.source, |item| {
        item.id == target.source
    })?
    .name
    .clone();

    let current_items = remote.scene_items(&original_scene).await?;
    let original_item = find_item(&current_items, &original_scene, &name, |item| {
        item.name == name
    })?
    .id
    .clone();

    info!(
        "fading '{name}' from '{original_scene}' (item {original_item}) to '{}' (item {})",
        target.scene, target.source
    );

    let mut steps = Vec::with_capacity(5);

    steps.push(
        run(
            Step::ShowInCurrent,
            remote.set_item_enabled(&original_scene, &original_item, true),
        )
        .await,
    );
    steps.push(
        run(
            Step::ShowInTarget,
            remote.set_item_enabled(&target.scene, &target.source, true),
        )
        .await,
    );

    tokio::time::sleep(PRE_ROLL).await;

    steps.push(run(Step::SwitchScene, remote.set_current_scene(&target.scene)).await);

    tokio::time::sleep(SETTLE).await;

    steps.push(
        run(
            Step::HideInOriginal,
            remote.set_item_enabled(&original_scene, &original_item, false),
        )
        .await,
    );
    steps.push(
        run(
            Step::HideInTarget,
            remote.set_item_enabled(&target.scene, &target.source, false),
        )
        .await,
    );

    Ok(FadeOutcome {
        target,
        original_scene,
        original_item,
        steps,
    })
}

/// Linear scan; items are re-resolved on every press.
fn find_item<'a>(
    items: &'a [SceneItem],
    scene: &str,
    wanted: &str,
    matches: impl Fn(&SceneItem) -> bool,
) -> Result<&'a SceneItem> {
    items
        .iter()
        .find(|item| matches(*item))
        .ok_or_else(|| PluginError::ItemNotFound {
            scene: scene.to_string(),
            item: wanted.to_string(),
        })
}

async fn run(step: Step, call: impl Future<Output = Result<()>>) -> StepReport {
    let result = call.await;
    match &result {
        Ok(()) => debug!("{step}: ok"),
        Err(e) => warn!("{step} failed, continuing: {e}"),
    }
    StepReport { step, result }
}
