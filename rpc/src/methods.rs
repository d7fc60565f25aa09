//! Method table dispatched by the server's request-handling task.
//! Every handler is synchronous and fast: it only touches in-memory
//! player/catalog state, so it runs directly on the tokio task rather
//! than being offloaded to `spawn_blocking`.

use std::sync::Arc;

use media::{MediaCatalog, MediaEntry, MediaEntryPatch};
use player::{OptionsPatch, Player, PlayerState};
use serde_json::{json, Value};

use crate::protocol::RpcError;

pub struct Context {
    pub player: Arc<Player>,
    pub catalog: Arc<dyn MediaCatalog>,
}

pub fn dispatch(ctx: &Context, method: &str, params: &Value) -> Result<Value, RpcError> {
    match method {
        "play" => {
            ctx.player.play();
            Ok(Value::Null)
        }
        "pause" => {
            ctx.player.set_pause(true);
            Ok(Value::Null)
        }
        "resume" => {
            ctx.player.set_pause(false);
            Ok(Value::Null)
        }
        "stop" => {
            ctx.player.stop();
            Ok(Value::Null)
        }
        "next" => {
            ctx.player.next().map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(Value::Null)
        }
        "change" | "setnext" => {
            let id = require_str(params, "id")?;
            ctx.player
                .media(id)
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(Value::Null)
        }
        "list" => Ok(json!(ctx.catalog.list())),
        "info" => {
            let id = require_str(params, "id")?;
            ctx.catalog
                .get(id)
                .map(|e| json!(e))
                .ok_or_else(|| RpcError::invalid_params(format!("unknown media id: {id}")))
        }
        "setinfo" => {
            let id = require_str(params, "id")?;
            let patch: MediaEntryPatch = serde_json::from_value(
                params.get("patch").cloned().unwrap_or(Value::Null),
            )
            .map_err(|e| RpcError::invalid_params(e.to_string()))?;
            let updated = ctx
                .catalog
                .set_info(id, patch)
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(json!(updated))
        }
        "filter" => {
            let query = params.get("q").and_then(Value::as_str).unwrap_or("").to_lowercase();
            let matches = ctx.catalog.filter(&|e: &MediaEntry| {
                e.title.as_deref().unwrap_or_default().to_lowercase().contains(&query)
                    || e.artist.as_deref().unwrap_or_default().to_lowercase().contains(&query)
                    || e.id.to_lowercase().contains(&query)
            });
            Ok(json!(matches))
        }
        "append" => {
            let entry: MediaEntry = serde_json::from_value(params.clone())
                .map_err(|e| RpcError::invalid_params(e.to_string()))?;
            ctx.catalog
                .append(entry)
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(Value::Null)
        }
        "remove" => {
            let id = require_str(params, "id")?;
            let removed = ctx
                .catalog
                .remove(id)
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(json!(removed))
        }
        "status" => Ok(json!({
            "state": ctx.player.state().as_str(),
            "paused": ctx.player.is_paused(),
            "media_id": ctx.player.media_id(),
            "volume": ctx.player.volume(),
        })),
        "options" => {
            let patch = OptionsPatch {
                random: params.get("random").and_then(Value::as_bool),
                loop_enabled: params.get("loop").and_then(Value::as_bool),
            };
            let opts = ctx.player.set_options(patch);
            Ok(json!({ "random": opts.random, "loop": opts.loop_enabled }))
        }
        "volume" => {
            let current = ctx.player.volume() as i64;
            let level = if let Some(step) = params.get("step").and_then(Value::as_i64) {
                (current + step).clamp(0, 100)
            } else if let Some(level) = params.get("level").and_then(Value::as_i64) {
                level.clamp(0, 100)
            } else {
                current
            };
            ctx.player.set_volume(level as u8);
            Ok(json!({ "level": ctx.player.volume() }))
        }
        "getposition" => Ok(json!({ "position_ms": 0 })),
        "capabilities" => Ok(json!({
            "methods": [
                "play", "pause", "resume", "stop", "next", "change", "setnext",
                "list", "info", "setinfo", "filter", "append", "remove",
                "status", "options", "volume", "getposition", "capabilities",
            ],
        })),
        other => Err(RpcError::method_not_found(other)),
    }
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, RpcError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::invalid_params(format!("missing string field: {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use media::MemoryCatalog;

    fn ctx() -> Context {
        let catalog: Arc<dyn MediaCatalog> = Arc::new(MemoryCatalog::default());
        let player = Arc::new(Player::new(catalog.clone(), "file:///tmp/pmoplayer-test.pcm"));
        Context { player, catalog }
    }

    #[test]
    fn unknown_method_is_method_not_found() {
        let ctx = ctx();
        let err = dispatch(&ctx, "bogus", &Value::Null).unwrap_err();
        assert_eq!(err.code, crate::protocol::METHOD_NOT_FOUND);
    }

    #[test]
    fn append_then_list_round_trips() {
        let ctx = ctx();
        let entry = json!({ "id": "a", "uri": "file:///a.flac", "extra": {} });
        dispatch(&ctx, "append", &entry).unwrap();
        let list = dispatch(&ctx, "list", &Value::Null).unwrap();
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[test]
    fn info_for_missing_id_is_invalid_params() {
        let ctx = ctx();
        let err = dispatch(&ctx, "info", &json!({ "id": "missing" })).unwrap_err();
        assert_eq!(err.code, crate::protocol::INVALID_PARAMS);
    }

    #[test]
    fn status_reflects_player_defaults() {
        let ctx = ctx();
        let status = dispatch(&ctx, "status", &Value::Null).unwrap();
        assert_eq!(status["state"], "stop");
        assert_eq!(status["volume"], 100);
    }

    #[test]
    fn volume_step_round_trips_to_the_original_level() {
        let ctx = ctx();
        let start = dispatch(&ctx, "volume", &Value::Null).unwrap()["level"].as_i64().unwrap();
        dispatch(&ctx, "volume", &json!({ "step": 5 })).unwrap();
        dispatch(&ctx, "volume", &json!({ "step": -5 })).unwrap();
        assert_eq!(ctx.player.volume() as i64, start);
    }

    #[test]
    fn volume_step_clamps_at_the_bounds() {
        let ctx = ctx();
        dispatch(&ctx, "volume", &json!({ "level": 100 })).unwrap();
        let result = dispatch(&ctx, "volume", &json!({ "step": 50 })).unwrap();
        assert_eq!(result["level"], 100);
    }

    #[test]
    fn options_persist_across_calls() {
        let ctx = ctx();
        let result = dispatch(&ctx, "options", &json!({ "random": true })).unwrap();
        assert_eq!(result["random"], true);
        assert_eq!(result["loop"], false);
        let result = dispatch(&ctx, "options", &json!({ "loop": true })).unwrap();
        assert_eq!(result["random"], true);
        assert_eq!(result["loop"], true);
    }
}
