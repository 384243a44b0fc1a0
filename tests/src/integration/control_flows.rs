//! Control-channel choreography: the out-of-band events the pipeline
//! publishes while it works, and the mutations workers apply when they
//! hear them.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_bus::{
        BusEvent, BusTopic, EventFilter, InMemoryControlBus, QueueMessage, ShardedQueueSet,
        Subscription,
    };
    use shared_types::codec::ByteWriter;
    use shared_types::config::{IndexerConfig, RoutingMode, Streaming};
    use shared_types::entities::{
        trx_status, Act, ActionData, ActionReceipt, ActionTrace, BlockPosition, BlockTransaction,
        ProducerKey, ProducerSchedule, RawBlockEnvelope, RawDeltaRow, RoutedTransaction,
        SignedBlock, TableDeltaGroup, TransactionTrace, TrxMetadata,
    };
    use shared_types::filters::FilterSet;
    use shared_types::ipc::{ControlEvent, DsErrorKind};
    use shared_types::schema::{AbiDefinition, FieldDef, StructDef};
    use st_01_abi_cache::testing::{CountingDiagnostics, MockChainClient, MockSchemaIndex};
    use st_01_abi_cache::AbiCache;
    use st_02_action_decoder::ActionDecoder;
    use st_03_trace_reshaper::parser_for;
    use st_03_trace_reshaper::testing as wire;
    use st_03_trace_reshaper::wire::TraceLayout;
    use st_04_delta_processor::rows::AccountRow;
    use st_04_delta_processor::{DeltaProcessor, HandlerRegistry};
    use st_05_work_router::WorkRouter;
    use st_06_intake::{BusDiagnostics, DecoderWorker, IntakeLoop};
    use st_07_dispatcher::{Dispatcher, OutputReceivers};

    type TestIntake = IntakeLoop<MockSchemaIndex, MockChainClient, CountingDiagnostics>;

    type PoolReceivers = Vec<tokio::sync::mpsc::Receiver<QueueMessage>>;

    fn intake(
        configure: impl FnOnce(&mut IndexerConfig),
    ) -> (TestIntake, OutputReceivers, PoolReceivers, Arc<InMemoryControlBus>) {
        let mut config = IndexerConfig::default();
        configure(&mut config);
        let system = config.settings.system_contract.clone();

        let diagnostics = Arc::new(CountingDiagnostics::default());
        let cache = Arc::new(AbiCache::new(
            Arc::new(MockSchemaIndex::default()),
            Arc::new(MockChainClient::default()),
            Arc::clone(&diagnostics),
        ));
        let processor = DeltaProcessor::new(
            cache,
            diagnostics,
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
        let bus = Arc::new(InMemoryControlBus::new());
        let intake = IntakeLoop::new(
            parser_for(config.settings.parser_version),
            processor,
            router,
            Arc::new(dispatcher),
            Arc::clone(&bus),
            &config,
        );
        (intake, outputs, pool, bus)
    }

    fn control_sub(bus: &InMemoryControlBus) -> Subscription {
        bus.subscribe(EventFilter::topics(vec![BusTopic::Control]))
    }

    /// Transaction ids ride the wire as checksum256; full-width hex
    /// survives the round trip intact.
    fn tid(n: u8) -> String {
        hex::encode([n; 32])
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

    fn executed_trx(id: &str, global_sequence: u64) -> TransactionTrace {
        TransactionTrace {
            id: id.to_string(),
            status: trx_status::EXECUTED,
            cpu_usage_us: 100,
            net_usage_words: 12,
            action_traces: vec![ActionTrace {
                action_ordinal: 1,
                receipt: Some(ActionReceipt {
                    receiver: "eosio.token".to_string(),
                    act_digest: "d1".to_string(),
                    global_sequence,
                    recv_sequence: 1,
                    auth_sequence: Vec::new(),
                    code_sequence: 1,
                    abi_sequence: 1,
                }),
                receiver: "eosio.token".to_string(),
                act: Some(transfer_act()),
                ..ActionTrace::default()
            }],
            signatures: vec!["SIG_K1_a".to_string()],
        }
    }

    fn envelope(block_num: u64, block: SignedBlock, traces: Vec<TransactionTrace>) -> RawBlockEnvelope {
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

    fn signed_block(new_producers: Option<ProducerSchedule>) -> SignedBlock {
        SignedBlock {
            timestamp: "2024-01-01T00:00:00.000".to_string(),
            producer: "prodone".to_string(),
            schedule_version: 4,
            new_producers,
            transactions: vec![BlockTransaction {
                status: trx_status::EXECUTED,
                cpu_usage_us: 100,
                net_usage_words: 12,
                trx_id: "t1".to_string(),
                packed_actions: vec![transfer_act()],
            }],
        }
    }

    #[tokio::test]
    async fn test_account_delta_publishes_schema_update() {
        let (intake, mut outputs, _pool, bus) = intake(|_| {});
        let mut sub = control_sub(&bus);

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
        let mut env = envelope(1000, signed_block(None), vec![]);
        env.deltas = Some(wire::deflate(&wire::encode_delta_groups(&[
            TableDeltaGroup {
                name: "account".to_string(),
                rows: vec![RawDeltaRow {
                    present: true,
                    data: st_04_delta_processor::testing::encode_account_row(&AccountRow {
                        name: "dex".to_string(),
                        abi: serde_json::to_vec(&abi).unwrap(),
                    }),
                }],
            },
        ])));
        intake.process_block(env).await.unwrap();

        match sub.recv().await.unwrap() {
            BusEvent::Control(ControlEvent::UpdateSchema(record)) => {
                assert_eq!(record.account, "dex");
                assert_eq!(record.block, 1000);
                assert_eq!(record.actions, vec!["ping".to_string()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        // The same record travels on the durable abi queue.
        let stored = outputs.abi[0].try_recv().unwrap();
        assert_eq!(stored.payload["account"], "dex");
    }

    #[tokio::test]
    async fn test_included_trx_published_in_live_mode() {
        let (intake, _outputs, _pool, bus) = intake(|c| c.indexer.live_mode = true);
        let mut sub = control_sub(&bus);

        let mut env = envelope(1000, signed_block(None), vec![executed_trx(&tid(1), 500)]);
        // Head caught up: within one block of the tip.
        env.head = Some(BlockPosition {
            block_num: 1000,
            block_id: "head".to_string(),
        });
        intake.process_block(env).await.unwrap();

        match sub.recv().await.unwrap() {
            BusEvent::Control(ControlEvent::IncludedTrx {
                trx_id, root_act, ..
            }) => {
                assert_eq!(trx_id, tid(1));
                assert_eq!(root_act.account, "eosio.token");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match sub.recv().await.unwrap() {
            BusEvent::Control(ControlEvent::ConsumedBlock { live, .. }) => assert!(live),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_schedule_rotation_publishes_new_schedule() {
        let (intake, _outputs, _pool, bus) = intake(|_| {});
        let mut sub = control_sub(&bus);

        let schedule = ProducerSchedule {
            version: 5,
            producers: vec![ProducerKey {
                producer_name: "prodtwo".to_string(),
                block_signing_key: "PUB_K1_x".to_string(),
            }],
        };
        intake
            .process_block(envelope(1000, signed_block(Some(schedule)), vec![]))
            .await
            .unwrap();

        match sub.recv().await.unwrap() {
            BusEvent::Control(ControlEvent::NewSchedule {
                block_num,
                new_producers,
                ..
            }) => {
                assert_eq!(block_num, 1000);
                assert_eq!(new_producers.version, 5);
                assert_eq!(new_producers.producers[0].producer_name, "prodtwo");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_reports_throughput_when_queue_closes() {
        let diagnostics = Arc::new(CountingDiagnostics::default());
        let cache = Arc::new(AbiCache::new(
            Arc::new(MockSchemaIndex::default()),
            Arc::new(MockChainClient::default()),
            Arc::clone(&diagnostics),
        ));
        let decoder = ActionDecoder::new(Arc::clone(&cache), diagnostics, "eosio");
        let (dispatcher, _outputs) = Dispatcher::new(
            "local",
            &shared_types::config::Scaling::default(),
            Streaming::default(),
        );
        let bus = Arc::new(InMemoryControlBus::new());
        let worker = DecoderWorker::new(
            cache,
            decoder,
            Arc::new(dispatcher),
            Arc::clone(&bus),
            "eosio",
        );
        let mut sub = control_sub(&bus);

        let routed = RoutedTransaction {
            trace: executed_trx("t1", 500),
            headers: TrxMetadata {
                trx_id: "t1".to_string(),
                block_num: 1000,
                block_id: "b1000".to_string(),
                ..TrxMetadata::default()
            },
        };
        let (queues, mut pool) = ShardedQueueSet::new("ds_pool", 1);
        queues
            .publish_to(
                1,
                QueueMessage::new("eosio.token", 1000, serde_json::to_value(&routed).unwrap()),
            )
            .unwrap();
        drop(queues);

        worker.run(pool.remove(0)).await.unwrap();
        match sub.recv().await.unwrap() {
            BusEvent::Control(ControlEvent::DsReport { actions, deltas }) => {
                assert_eq!(actions, 1);
                assert_eq!(deltas, 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cache_miss_diagnostics_reach_control_channel() {
        let bus = Arc::new(InMemoryControlBus::new());
        let diagnostics = Arc::new(BusDiagnostics::new(Arc::clone(&bus)));
        let cache = Arc::new(AbiCache::new(
            Arc::new(MockSchemaIndex::default()),
            Arc::new(MockChainClient::default()),
            Arc::clone(&diagnostics),
        ));
        let decoder = ActionDecoder::new(Arc::clone(&cache), diagnostics, "eosio");
        let (dispatcher, _outputs) = Dispatcher::new(
            "local",
            &shared_types::config::Scaling::default(),
            Streaming::default(),
        );
        let worker = DecoderWorker::new(
            cache,
            decoder,
            Arc::new(dispatcher),
            Arc::clone(&bus),
            "eosio",
        );
        let mut sub = control_sub(&bus);

        let routed = RoutedTransaction {
            trace: TransactionTrace {
                id: "m1".to_string(),
                status: trx_status::EXECUTED,
                action_traces: vec![ActionTrace {
                    action_ordinal: 1,
                    receipt: Some(ActionReceipt {
                        receiver: "mystery".to_string(),
                        act_digest: "d1".to_string(),
                        global_sequence: 700,
                        recv_sequence: 1,
                        auth_sequence: Vec::new(),
                        code_sequence: 1,
                        abi_sequence: 1,
                    }),
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
                trx_id: "m1".to_string(),
                block_num: 1000,
                block_id: "b1000".to_string(),
                ..TrxMetadata::default()
            },
        };
        worker.process(routed).await.unwrap();

        match sub.recv().await.unwrap() {
            BusEvent::Control(ControlEvent::DsError(e)) => {
                assert_eq!(e.kind, DsErrorKind::Action);
                assert_eq!(e.contract, "mystery");
                assert_eq!(e.name, "boom");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_pipeline_metrics_register_and_encode() {
        let _handle = trail_telemetry::register_metrics().unwrap();
        trail_telemetry::metrics::BLOCKS_CONSUMED.inc();
        trail_telemetry::metrics::DS_ERRORS
            .with_label_values(&["action"])
            .inc();

        let text = trail_telemetry::encode_metrics().unwrap();
        assert!(text.contains("trail_intake_blocks_consumed_total"));
        assert!(text.contains("kind=\"action\""));
    }
}
