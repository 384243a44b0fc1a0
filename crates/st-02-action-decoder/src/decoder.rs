//! The decode worker core.

use crate::enrich::EnricherRegistry;
use shared_types::entities::{Act, ActionData};
use shared_types::ipc::{DsError, DsErrorKind};
use shared_types::schema::SchemaKind;
use st_01_abi_cache::{AbiCache, ChainClient, DiagnosticSink, SchemaIndex};
use std::sync::Arc;
use tracing::{debug, warn};

/// How a single action left the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Structured JSON is attached to the action.
    Decoded,
    /// The raw payload was retained as lowercase hex.
    HexFallback,
}

/// Decodes action payloads in place using a shared schema cache.
pub struct ActionDecoder<I, C, D> {
    cache: Arc<AbiCache<I, C, D>>,
    diagnostics: Arc<D>,
    enrichers: EnricherRegistry,
    system_contract: String,
}

impl<I, C, D> ActionDecoder<I, C, D>
where
    I: SchemaIndex,
    C: ChainClient,
    D: DiagnosticSink,
{
    #[must_use]
    pub fn new(
        cache: Arc<AbiCache<I, C, D>>,
        diagnostics: Arc<D>,
        system_contract: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            diagnostics,
            enrichers: EnricherRegistry::new(),
            system_contract: system_contract.into(),
        }
    }

    /// Register enrichment hooks before the decoder goes live.
    pub fn enrichers_mut(&mut self) -> &mut EnricherRegistry {
        &mut self.enrichers
    }

    /// Decode one action in place. `global_sequence` identifies the action
    /// in diagnostics; `block_num` selects the schema version.
    pub async fn decode(&self, act: &mut Act, global_sequence: u64, block_num: u64) -> DecodeOutcome {
        let Some(payload) = act.data.as_hex().map(str::to_ascii_lowercase) else {
            // Already structured; nothing to do.
            return DecodeOutcome::Decoded;
        };

        let resolution = self
            .cache
            .resolve(&act.account, &act.name, SchemaKind::Action, block_num)
            .await;
        let Some(resolution) = resolution else {
            // Schema miss: the cache already diagnosed it when it
            // registered the negative entry.
            debug!(
                contract = %act.account,
                action = %act.name,
                block_num,
                "no schema, forwarding hex"
            );
            act.data = ActionData::Hex(payload);
            return DecodeOutcome::HexFallback;
        };

        match resolution.schema.abi.decode_hex(&resolution.type_name, &payload) {
            Ok(mut value) => {
                if !self.is_onblock(act) {
                    self.enrichers.apply(act, &mut value);
                }
                act.data = ActionData::Decoded(value);
                DecodeOutcome::Decoded
            }
            Err(e) => {
                warn!(
                    contract = %act.account,
                    action = %act.name,
                    block_num,
                    global_sequence,
                    %e,
                    "payload rejected by schema, forwarding hex"
                );
                self.diagnostics
                    .report(DsError {
                        kind: DsErrorKind::Action,
                        contract: act.account.clone(),
                        name: act.name.clone(),
                        block_num,
                        global_sequence,
                    })
                    .await;
                act.data = ActionData::Hex(payload);
                DecodeOutcome::HexFallback
            }
        }
    }

    fn is_onblock(&self, act: &Act) -> bool {
        act.account == self.system_contract && act.name == "onblock"
    }
}
