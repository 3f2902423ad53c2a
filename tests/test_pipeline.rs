#[cfg(test)]
mod pipeline_tests {
    use mesh_udp_monitor::config::{MonitorConfig, PlausibilityThresholds, DEFAULT_MULTICAST_GROUP};
    use mesh_udp_monitor::decode::PortKind;
    use mesh_udp_monitor::decrypt::{apply_keystream, nonce, FailureKind};
    use mesh_udp_monitor::format::{describe_hops, format_node_id, format_rssi, format_snr, hex_dump, raw_summary};
    use mesh_udp_monitor::keys::{truncate_key, KeyCatalog, CHANNEL_2_PSK, DEFAULT_PSK};
    use mesh_udp_monitor::listener::{ReceiveBackoff, MAX_CONSECUTIVE_ERRORS};
    use mesh_udp_monitor::monitor::TrafficMonitor;
    use mesh_udp_monitor::nodes::{NodeDirectory, NodeIdentity};
    use mesh_udp_monitor::orchestrator::PacketOrchestrator;
    use mesh_udp_monitor::parser::envelope::{Envelope, Payload};
    use mesh_udp_monitor::parser::schema::{mesh_packet::PayloadVariant, Data, MeshPacket, Priority, User};
    use prost::Message;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn source() -> SocketAddr {
        "192.168.1.50:4403".parse().unwrap()
    }

    fn orchestrator() -> PacketOrchestrator {
        PacketOrchestrator::new(KeyCatalog::new(), PlausibilityThresholds::default())
    }

    fn encrypted_packet(from: u32, id: u32, channel: u32, ciphertext: Vec<u8>) -> Vec<u8> {
        MeshPacket {
            from,
            to: 0xffff_ffff,
            channel,
            id,
            hop_limit: 3,
            hop_start: 5,
            payload_variant: Some(PayloadVariant::Encrypted(ciphertext)),
            ..Default::default()
        }
        .encode_to_vec()
    }

    #[test]
    fn test_envelope_parse() {
        let bytes = MeshPacket {
            from: 0x0a0b_0c0d,
            to: 0x1122_3344,
            channel: 0x1_08,
            id: 99,
            hop_limit: 2,
            hop_start: 3,
            rx_rssi: -70,
            rx_snr: 6.5,
            priority: Priority::Reliable as i32,
            payload_variant: Some(PayloadVariant::Encrypted(vec![1, 2, 3])),
            ..Default::default()
        }
        .encode_to_vec();

        let env = Envelope::parse(&bytes).unwrap();
        assert_eq!(env.sender, 0x0a0b_0c0d);
        assert_eq!(env.channel_hash, 0x08);
        assert_eq!(env.packet_id, 99);
        assert!(!env.is_broadcast());
        assert!(env.is_encrypted());
        assert_eq!(env.priority_level(), Some(Priority::Reliable));
        assert_eq!(env.payload, Payload::Encrypted(vec![1, 2, 3]));
        assert!(Envelope::parse(&[0xff]).is_err());
    }

    #[test]
    fn test_orchestrator_decrypts_and_decodes() {
        let plain = Data { portnum: 1, payload: b"hi".to_vec(), ..Default::default() }.encode_to_vec();
        let cipher = apply_keystream(&truncate_key(&CHANNEL_2_PSK), &nonce(272, 0x0a0b_0c0d), &plain);
        let datagram = encrypted_packet(0x0a0b_0c0d, 272, 0, cipher);

        let mut orch = orchestrator();
        let report = orch.process(&datagram, source(), 1_700_000_000.0);
        assert_eq!(report.number, 1);
        assert_eq!(report.size, datagram.len());
        assert_eq!(report.failure(), None);

        let attempt = report.decryption.as_ref().unwrap();
        assert_eq!(attempt.candidate_index, Some(2));
        let decoded = report.decoded.as_ref().unwrap();
        assert_eq!(decoded.kind, PortKind::Text);
        assert_eq!(decoded.fields.get("Message Text"), Some("\"hi\""));

        let json = report.to_json();
        assert_eq!(json["decoded"]["kind"], "Text");
        assert_eq!(json["decoded"]["fields"]["Message Text"], "\"hi\"");
        assert_eq!(json["decryption"]["key"], "Channel 2 (YardSale)");
        assert_eq!(json["envelope"]["from"], "!0a0b0c0d");
    }

    #[test]
    fn test_orchestrator_undecryptable() {
        let datagram = encrypted_packet(0x1234_5678, 41351, 0, vec![0x91]);
        let mut orch = orchestrator();
        let report = orch.process(&datagram, source(), 0.0);

        assert_eq!(report.failure(), Some(FailureKind::KeyExhaustion));
        let decoded = report.decoded.as_ref().unwrap();
        assert_eq!(decoded.kind, PortKind::Encrypted);
        assert_eq!(decoded.fields.get("Port"), Some("ENCRYPTED"));
        assert_eq!(decoded.fields.get("Status"), Some("Unable to decrypt"));
        assert_eq!(orch.monitor().snapshot().counters.undecryptable, 1);
    }

    #[test]
    fn test_orchestrator_keeps_partial_distinct() {
        let cipher = apply_keystream(&DEFAULT_PSK, &nonce(10, 20), &[0x08]);
        let datagram = encrypted_packet(20, 10, 0, cipher);
        let mut orch = orchestrator();
        let report = orch.process(&datagram, source(), 0.0);

        assert!(report.decryption.as_ref().unwrap().is_partial());
        let decoded = report.decoded.as_ref().unwrap();
        assert_eq!(decoded.kind, PortKind::Encrypted);
        assert_eq!(decoded.fields.get("Status"), Some("Partial decrypt (unverified)"));
        let counters = orch.monitor().snapshot().counters;
        assert_eq!(counters.partial, 1);
        assert_eq!(counters.decrypted, 0);
    }

    #[test]
    fn test_orchestrator_malformed_envelope() {
        let mut orch = orchestrator();
        let report = orch.process(&[0xff], source(), 0.0);
        assert!(report.envelope.is_none());
        assert!(report.envelope_error.is_some());
        assert_eq!(report.failure(), Some(FailureKind::MalformedEnvelope));
        assert!(report.decoded.is_none());

        let second = orch.process(&[0xff, 0xff], source(), 0.0);
        assert_eq!(second.number, 2);
        let counters = orch.monitor().snapshot().counters;
        assert_eq!(counters.malformed, 2);
        assert_eq!(counters.packets, 2);
        assert_eq!(counters.bytes, 3);
    }

    #[test]
    fn test_orchestrator_learns_node_names() {
        let user = User {
            id: "!0a0b0c0d".to_string(),
            long_name: "Base Station".to_string(),
            short_name: "BASE".to_string(),
            hw_model: 9,
            ..Default::default()
        };
        let datagram = MeshPacket {
            from: 0x0a0b_0c0d,
            to: 0xffff_ffff,
            payload_variant: Some(PayloadVariant::Decoded(Data {
                portnum: 4,
                payload: user.encode_to_vec(),
                ..Default::default()
            })),
            ..Default::default()
        }
        .encode_to_vec();

        let nodes = Arc::new(NodeDirectory::new());
        let mut orch = orchestrator().with_nodes(Arc::clone(&nodes));
        orch.process(&datagram, source(), 0.0);

        assert_eq!(nodes.display_name(0x0a0b_0c0d), "!0a0b0c0d (Base Station)");
        assert_eq!(nodes.get(0x0a0b_0c0d).unwrap().hw_model, Some(9));
        assert_eq!(nodes.display_name(0x0000_0001), "!00000001");
    }

    #[test]
    fn test_node_directory_short_name_fallback() {
        let nodes = NodeDirectory::new();
        nodes.insert(5, NodeIdentity { short_name: "RLY".to_string(), ..Default::default() });
        assert_eq!(nodes.display_name(5), "!00000005 (RLY)");
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_monitor_counters_under_concurrency() {
        let monitor = Arc::new(TrafficMonitor::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&monitor);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.record_packet(10);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let snap = monitor.snapshot();
        assert_eq!(snap.counters.packets, 4000);
        assert_eq!(snap.counters.bytes, 40_000);
        assert!(monitor.render().contains("Total packets:  4000"));
    }

    #[test]
    fn test_monitor_top_senders() {
        let monitor = TrafficMonitor::new();
        for _ in 0..3 {
            monitor.record_sender(7);
        }
        monitor.record_sender(9);
        assert_eq!(monitor.top_senders(1), vec![(7, 3)]);
    }

    #[test]
    fn test_config_load_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.json");
        std::fs::write(&path, r#"{"port": 5000, "thresholds": {"voltage_max": 5.0}}"#).unwrap();

        let config = MonitorConfig::load(&path).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.multicast_group, DEFAULT_MULTICAST_GROUP);
        assert_eq!(config.thresholds.voltage_max, 5.0);
        assert_eq!(config.thresholds.voltage_min, 0.0);
        assert_eq!(config.thresholds.temperature_max, 100.0);
        assert_eq!(config.recv_timeout().as_millis(), 1000);

        assert!(MonitorConfig::load(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_thresholds_are_open_intervals() {
        let t = PlausibilityThresholds::default();
        assert!(!t.plausible_voltage(0.0));
        assert!(t.plausible_voltage(3.7));
        assert!(!t.plausible_voltage(10.0));
        assert!(!t.plausible_temperature(-50.0));
        assert!(t.plausible_temperature(-49.9));
        assert!(!t.plausible_temperature(f32::NAN));
    }

    #[test]
    fn test_presentation_helpers() {
        assert_eq!(format_node_id(0xabc), "!00000abc");
        assert_eq!(raw_summary(&[0xab; 3]), "bytes(3): ababab");
        let long = raw_summary(&[0u8; 25]);
        assert!(long.starts_with("bytes(25): "));
        assert!(long.ends_with("..."));
        assert_eq!(long.len(), "bytes(25): ".len() + 40 + 3);

        let dump = hex_dump(b"AB\x00", 16);
        assert!(dump.starts_with("  0000: 41 42 00"));
        assert!(dump.ends_with("|AB.|"));

        assert_eq!(describe_hops(3, 5).as_deref(), Some("Hops: 2 of 5"));
        assert_eq!(describe_hops(3, 0).as_deref(), Some("Hops: 3 remaining"));
        assert_eq!(describe_hops(0, 0), None);
        assert_eq!(format_rssi(-65), "-65 dBm (Good)");
        assert_eq!(format_snr(7.5), "7.5 dB (Good)");
    }

    #[test]
    fn test_leaderboard_resets_at_cap() {
        let monitor = TrafficMonitor::with_leaderboard_cap(3);
        for sender in 1..=3 {
            monitor.record_sender(sender);
        }
        monitor.record_sender(2);
        assert_eq!(monitor.leaderboard.len(), 3);

        monitor.record_sender(4);
        assert_eq!(monitor.leaderboard.len(), 1);
        assert_eq!(monitor.top_senders(5), vec![(4, 1)]);
    }

    #[test]
    fn test_node_directory_is_bounded() {
        let nodes = NodeDirectory::with_limit(2);
        nodes.insert(1, NodeIdentity { long_name: "One".to_string(), ..Default::default() });
        nodes.insert(2, NodeIdentity { long_name: "Two".to_string(), ..Default::default() });
        nodes.insert(2, NodeIdentity { long_name: "Two again".to_string(), ..Default::default() });
        assert_eq!(nodes.len(), 2);

        nodes.insert(3, NodeIdentity { long_name: "Three".to_string(), ..Default::default() });
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.display_name(3), "!00000003 (Three)");
    }

    #[test]
    fn test_receive_backoff_gives_up_on_repeated_errors() {
        let mut backoff = ReceiveBackoff::default();
        let mut delays = Vec::new();
        for _ in 1..MAX_CONSECUTIVE_ERRORS {
            delays.push(backoff.on_error().unwrap());
        }
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(backoff.on_error(), None);

        backoff.reset();
        assert_eq!(backoff.consecutive(), 0);
        assert!(backoff.on_error().is_some());
    }
}
