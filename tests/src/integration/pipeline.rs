//! End-to-end pipeline tests: intake loop, work router, decoder workers
//! and dispatcher wired together the way a running indexer wires them.
//!
//! ```text
//! [envelope] → [IntakeLoop] ──deltas──→ [Dispatcher] → output queues
//!                   │
//!                   └──routed trx──→ [WorkRouter] → ds pool queues
//!                                                        │
//!                                    [DecoderWorker] ←───┘
//!                                          │
//!                                          └──→ [Dispatcher] → action queues
//! ```

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_bus::{BusEvent, BusTopic, EventFilter, InMemoryControlBus, ShardedQueueSet};
    use shared_types::codec::ByteWriter;
    use shared_types::config::{IndexerConfig, RoutingMode, Streaming};
    use shared_types::entities::{
        Act, ActionData, ActionReceipt, ActionTrace, BlockPosition, BlockTransaction,
        RawBlockEnvelope, RawDeltaRow, RoutedTransaction, TableDeltaGroup, TransactionTrace,
        TrxMetadata,
    };
    use shared_types::filters::FilterSet;
    use shared_types::ipc::ControlEvent;
    use shared_types::schema::{AbiDefinition, ContractSchema, FieldDef, StructDef};
    use shared_types::{entities::trx_status, errors::IndexerError};
    use st_01_abi_cache::testing::{CountingDiagnostics, MockChainClient, MockSchemaIndex};
    use st_01_abi_cache::AbiCache;
    use st_02_action_decoder::ActionDecoder;
    use st_03_trace_reshaper::testing as wire;
    use st_03_trace_reshaper::wire::TraceLayout;
    use st_03_trace_reshaper::parser_for;
    use st_04_delta_processor::rows::{AccountRow, ContractRow};
    use st_04_delta_processor::{DeltaProcessor, HandlerRegistry};
    use st_05_work_router::WorkRouter;
    use st_06_intake::{DecoderWorker, IntakeLoop};
    use st_07_dispatcher::{Dispatcher, OutputReceivers};

    type TestIntake = IntakeLoop<MockSchemaIndex, MockChainClient, CountingDiagnostics>;
    type TestWorker = DecoderWorker<MockSchemaIndex, MockChainClient, CountingDiagnostics>;
    type TestCache = AbiCache<MockSchemaIndex, MockChainClient, CountingDiagnostics>;

    /// The full pipeline: one intake loop, one decoder worker, shared
    /// dispatcher and control bus.
    struct Stack {
        intake: TestIntake,
        worker: TestWorker,
        worker_cache: Arc<TestCache>,
        worker_diag: Arc<CountingDiagnostics>,
        dispatcher: Arc<Dispatcher>,
        outputs: OutputReceivers,
        pool: Vec<tokio::sync::mpsc::Receiver<shared_bus::QueueMessage>>,
        bus: Arc<InMemoryControlBus>,
    }

    fn stack(
        worker_index: MockSchemaIndex,
        configure: impl FnOnce(&mut IndexerConfig),
    ) -> Stack {
        let mut config = IndexerConfig::default();
        configure(&mut config);
        let system = config.settings.system_contract.clone();

        let intake_diag = Arc::new(CountingDiagnostics::default());
        let intake_cache = Arc::new(AbiCache::new(
            Arc::new(MockSchemaIndex::default()),
            Arc::new(MockChainClient::default()),
            Arc::clone(&intake_diag),
        ));
        let processor = DeltaProcessor::new(
            intake_cache,
            intake_diag,
            HandlerRegistry::with_defaults(&system),
            FilterSet::from_config(&config),
            config.features.clone(),
            system.clone(),
        );
        let (queues, pool) = ShardedQueueSet::new("ds_pool", config.scaling.ds_pool_size);
        let router = WorkRouter::new(
            queues,
            FilterSet::from_config(&config),
            RoutingMode::RoundRobin,
            &system,
            config.whitelists.max_depth,
        );
        let (dispatcher, outputs) =
            Dispatcher::new(&config.settings.chain, &config.scaling, Streaming::default());
        let dispatcher = Arc::new(dispatcher);
        let bus = Arc::new(InMemoryControlBus::new());
        let intake = IntakeLoop::new(
            parser_for(config.settings.parser_version),
            processor,
            router,
            Arc::clone(&dispatcher),
            Arc::clone(&bus),
            &config,
        );

        let worker_diag = Arc::new(CountingDiagnostics::default());
        let worker_cache = Arc::new(AbiCache::new(
            Arc::new(worker_index),
            Arc::new(MockChainClient::default()),
            Arc::clone(&worker_diag),
        ));
        let decoder = ActionDecoder::new(Arc::clone(&worker_cache), Arc::clone(&worker_diag), &system);
        let worker = DecoderWorker::new(
            Arc::clone(&worker_cache),
            decoder,
            Arc::clone(&dispatcher),
            Arc::clone(&bus),
            &system,
        );

        Stack {
            intake,
            worker,
            worker_cache,
            worker_diag,
            dispatcher,
            outputs,
            pool,
            bus,
        }
    }

    fn transfer_schema() -> ContractSchema {
        let mut abi = AbiDefinition::default();
        abi.actions
            .insert("transfer".to_string(), "transfer".to_string());
        abi.structs.insert(
            "transfer".to_string(),
            StructDef {
                name: "transfer".to_string(),
                fields: vec![
                    FieldDef {
                        name: "from".to_string(),
                        type_name: "name".to_string(),
                    },
                    FieldDef {
                        name: "to".to_string(),
                        type_name: "name".to_string(),
                    },
                ],
            },
        );
        ContractSchema {
            account: "eosio.token".to_string(),
            valid_from: 0,
            valid_until: None,
            abi,
        }
    }

    fn ping_abi() -> AbiDefinition {
        let mut abi = AbiDefinition::default();
        abi.actions.insert("ping".to_string(), "ping".to_string());
        abi.structs.insert(
            "ping".to_string(),
            StructDef {
                name: "ping".to_string(),
                fields: vec![FieldDef {
                    name: "who".to_string(),
                    type_name: "name".to_string(),
                }],
            },
        );
        abi
    }

    fn transfer_act() -> Act {
        let mut w = ByteWriter::new();
        w.write_name("alice");
        w.write_name("bob");
        Act {
            account: "eosio.token".to_string(),
            name: "transfer".to_string(),
            authorization: Vec::new(),
            data: ActionData::Hex(hex::encode(w.into_bytes())),
        }
    }

    fn receipt(receiver: &str, global_sequence: u64, digest: &str) -> ActionReceipt {
        ActionReceipt {
            receiver: receiver.to_string(),
            act_digest: digest.to_string(),
            global_sequence,
            recv_sequence: 1,
            auth_sequence: Vec::new(),
            code_sequence: 1,
            abi_sequence: 1,
        }
    }

    fn executed_trx(id: &str, global_sequence: u64) -> TransactionTrace {
        TransactionTrace {
            id: id.to_string(),
            status: trx_status::EXECUTED,
            cpu_usage_us: 100,
            net_usage_words: 12,
            action_traces: vec![ActionTrace {
                action_ordinal: 1,
                creator_action_ordinal: 0,
                receipt: Some(receipt("eosio.token", global_sequence, "d1")),
                receiver: "eosio.token".to_string(),
                act: Some(transfer_act()),
                ..ActionTrace::default()
            }],
            signatures: vec!["SIG_K1_a".to_string()],
        }
    }

    fn envelope(block_num: u64, traces: Vec<TransactionTrace>) -> RawBlockEnvelope {
        let block = shared_types::entities::SignedBlock {
            timestamp: "2024-01-01T00:00:00.000".to_string(),
            producer: "prodone".to_string(),
            schedule_version: 4,
            new_producers: None,
            transactions: vec![BlockTransaction {
                status: trx_status::EXECUTED,
                cpu_usage_us: 100,
                net_usage_words: 12,
                trx_id: "t1".to_string(),
                packed_actions: vec![transfer_act()],
            }],
        };
        RawBlockEnvelope {
            head: Some(BlockPosition {
                block_num: block_num + 10,
                block_id: "head".to_string(),
            }),
            last_irreversible: Some(BlockPosition {
                block_num: block_num.saturating_sub(30),
                block_id: "lib".to_string(),
            }),
            this_block: Some(BlockPosition {
                block_num,
                block_id: format!("b{block_num}"),
            }),
            prev_block: Some(BlockPosition {
                block_num: block_num - 1,
                block_id: format!("b{}", block_num - 1),
            }),
            block: Some(wire::deflate(&wire::encode_signed_block(&block))),
            traces: Some(wire::deflate(&wire::encode_trace_list(
                &traces,
                TraceLayout::Flat,
            ))),
            deltas: None,
        }
    }

    /// Route one envelope through intake, then hand the routed payload to
    /// the worker the way a running pool member would receive it.
    async fn pump(stack: &mut Stack, env: RawBlockEnvelope) -> Result<u64, IndexerError> {
        stack.intake.process_block(env).await?;
        let mut decoded = 0;
        for rx in &mut stack.pool {
            while let Ok(message) = rx.try_recv() {
                let routed: RoutedTransaction = serde_json::from_value(message.payload)?;
                decoded += stack.worker.process(routed).await?;
            }
        }
        Ok(decoded)
    }

    #[tokio::test]
    async fn test_transfer_flows_from_envelope_to_action_document() {
        let mut f = stack(
            MockSchemaIndex::default().with_schema(transfer_schema()),
            |_| {},
        );

        let decoded = pump(&mut f, envelope(1000, vec![executed_trx("t1", 500)]))
            .await
            .unwrap();
        assert_eq!(decoded, 1);

        let doc = f.outputs.actions[0].try_recv().unwrap();
        assert_eq!(doc.routing_key, "eosio.token");
        assert_eq!(doc.payload["block_num"], 1000);
        assert_eq!(doc.payload["producer"], "prodone");
        assert_eq!(doc.payload["act"]["data"]["from"], "alice");
        assert_eq!(doc.payload["act"]["data"]["to"], "bob");
        // Block summary landed too.
        let block = f.outputs.blocks[0].try_recv().unwrap();
        assert_eq!(block.payload["trx_count"], 1);
    }

    #[tokio::test]
    async fn test_schema_from_block_n_decodes_actions_at_block_n_plus_one() {
        // Worker cache starts empty: the schema must travel from block N's
        // account delta, over the control channel, into the worker.
        let mut f = stack(MockSchemaIndex::default(), |_| {});
        let mut sub = f.bus.subscribe(EventFilter::topics(vec![BusTopic::Control]));

        let abi_json = serde_json::to_vec(&ping_abi()).unwrap();
        let mut env = envelope(1000, vec![]);
        env.deltas = Some(wire::deflate(&wire::encode_delta_groups(&[
            TableDeltaGroup {
                name: "account".to_string(),
                rows: vec![RawDeltaRow {
                    present: true,
                    data: st_04_delta_processor::testing::encode_account_row(&AccountRow {
                        name: "dex".to_string(),
                        abi: abi_json,
                    }),
                }],
            },
        ])));
        f.intake.process_block(env).await.unwrap();

        while let Ok(Some(event)) = sub.try_recv() {
            if let BusEvent::Control(event @ ControlEvent::UpdateSchema(_)) = event {
                f.worker.handle_control(&event);
            }
        }
        assert_eq!(f.worker_cache.hot_len(), 1);

        let mut w = ByteWriter::new();
        w.write_name("carol");
        let trx = TransactionTrace {
            id: "t2".to_string(),
            status: trx_status::EXECUTED,
            action_traces: vec![ActionTrace {
                action_ordinal: 1,
                receipt: Some(receipt("dex", 900, "dd")),
                receiver: "dex".to_string(),
                act: Some(Act {
                    account: "dex".to_string(),
                    name: "ping".to_string(),
                    authorization: Vec::new(),
                    data: ActionData::Hex(hex::encode(w.into_bytes())),
                }),
                ..ActionTrace::default()
            }],
            ..TransactionTrace::default()
        };
        let decoded = pump(&mut f, envelope(1001, vec![trx])).await.unwrap();
        assert_eq!(decoded, 1);

        let doc = f.outputs.actions[0].try_recv().unwrap();
        assert_eq!(doc.payload["act"]["data"]["who"], "carol");
    }

    #[tokio::test]
    async fn test_unknown_contract_degrades_to_hex_with_one_diagnostic() {
        let mut f = stack(MockSchemaIndex::default(), |_| {});

        let mystery = |gs: u64, digest: &str| RoutedTransaction {
            trace: TransactionTrace {
                id: format!("m{gs}"),
                status: trx_status::EXECUTED,
                action_traces: vec![ActionTrace {
                    action_ordinal: 1,
                    receipt: Some(receipt("mystery", gs, digest)),
                    receiver: "mystery".to_string(),
                    act: Some(Act {
                        account: "mystery".to_string(),
                        name: "boom".to_string(),
                        authorization: Vec::new(),
                        data: ActionData::Hex("00ff".to_string()),
                    }),
                    ..ActionTrace::default()
                }],
                ..TransactionTrace::default()
            },
            headers: TrxMetadata {
                trx_id: format!("m{gs}"),
                block_num: 1000,
                block_id: "b1000".to_string(),
                ..TrxMetadata::default()
            },
        };

        assert_eq!(f.worker.process(mystery(700, "d1")).await.unwrap(), 1);
        let doc = f.outputs.actions[0].try_recv().unwrap();
        assert_eq!(doc.payload["act"]["data"], "00ff");
        assert_eq!(f.worker_diag.count(), 1);
        assert_eq!(f.worker_cache.negative_len(), 1);

        // Covered by the negative entry: forwarded again, no new report.
        assert_eq!(f.worker.process(mystery(701, "d2")).await.unwrap(), 1);
        assert_eq!(f.worker_diag.count(), 1);
    }

    #[tokio::test]
    async fn test_removed_row_lands_on_removal_queue_only() {
        let mut f = stack(MockSchemaIndex::default(), |_| {});

        let mut env = envelope(1000, vec![]);
        env.deltas = Some(wire::deflate(&wire::encode_delta_groups(&[
            TableDeltaGroup {
                name: "contract_row".to_string(),
                rows: vec![RawDeltaRow {
                    present: false,
                    data: st_04_delta_processor::testing::encode_contract_row(&ContractRow {
                        code: "dex".to_string(),
                        scope: "dex".to_string(),
                        table: "orders".to_string(),
                        primary_key: 7,
                        payer: "dex".to_string(),
                        value: Vec::new(),
                    }),
                }],
            },
        ])));
        f.intake.process_block(env).await.unwrap();

        let notice = f.outputs.removals[0].try_recv().unwrap();
        assert_eq!(notice.payload["code"], "dex");
        assert_eq!(notice.payload["table"], "orders");
        assert_eq!(notice.payload["primary_key"], "7");
        for rx in &mut f.outputs.deltas {
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_routing_covers_the_whole_decoder_pool() {
        let mut f = stack(
            MockSchemaIndex::default().with_schema(transfer_schema()),
            |_| {},
        );

        let traces: Vec<_> = (0..4)
            .map(|i| executed_trx(&format!("t{i}"), 500 + i))
            .collect();
        f.intake
            .process_block(envelope(1000, traces))
            .await
            .unwrap();

        for rx in &mut f.pool {
            assert!(rx.try_recv().is_ok(), "every pool member gets work");
        }
    }

    #[tokio::test]
    async fn test_worker_pool_drains_routed_queues() {
        let mut f = stack(
            MockSchemaIndex::default().with_schema(transfer_schema()),
            |c| c.scaling.ds_pool_size = 2,
        );

        // Second pool member, wired to the same dispatcher and bus.
        let diag = Arc::new(CountingDiagnostics::default());
        let cache = Arc::new(AbiCache::new(
            Arc::new(MockSchemaIndex::default().with_schema(transfer_schema())),
            Arc::new(MockChainClient::default()),
            Arc::clone(&diag),
        ));
        let decoder = ActionDecoder::new(Arc::clone(&cache), diag, "eosio");
        let second = DecoderWorker::new(
            cache,
            decoder,
            Arc::clone(&f.dispatcher),
            Arc::clone(&f.bus),
            "eosio",
        );

        let first = Arc::new(f.worker);
        let second = Arc::new(second);
        let rx1 = f.pool.remove(0);
        let rx2 = f.pool.remove(0);
        let h1 = {
            let w = Arc::clone(&first);
            tokio::spawn(async move { w.run(rx1).await })
        };
        let h2 = {
            let w = Arc::clone(&second);
            tokio::spawn(async move { w.run(rx2).await })
        };

        let mut trx2 = executed_trx("t2", 501);
        if let Some(r) = trx2.action_traces[0].receipt.as_mut() {
            r.act_digest = "d2".to_string();
        }
        f.intake
            .process_block(envelope(1000, vec![executed_trx("t1", 500), trx2]))
            .await
            .unwrap();

        // Closing the router's queues terminates both workers.
        drop(f.intake);
        h1.await.unwrap().unwrap();
        h2.await.unwrap().unwrap();

        assert_eq!(first.actions_decoded() + second.actions_decoded(), 2);
        let delivered = f
            .outputs
            .actions
            .iter_mut()
            .map(|rx| std::iter::from_fn(|| rx.try_recv().ok()).count())
            .sum::<usize>();
        assert_eq!(delivered, 2);
    }
}
