#[cfg(test)]
mod decode_tests {
    use mesh_udp_monitor::config::PlausibilityThresholds;
    use mesh_udp_monitor::decode::{format_uptime, port_label, routing_error_name, MessageDecoder, PortKind};
    use mesh_udp_monitor::parser::schema::{
        routing, telemetry, AirQualityMetrics, DeviceMetrics, EnvironmentMetrics, Data, Position,
        PowerMetrics, RouteDiscovery, Routing, Telemetry, User,
    };
    use prost::Message;

    fn data(portnum: i32, payload: Vec<u8>) -> Data {
        Data { portnum, payload, ..Default::default() }
    }

    #[test]
    fn test_text_message() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let msg = decoder.decode_data(&data(1, b"hello mesh".to_vec()));
        assert_eq!(msg.kind, PortKind::Text);
        assert_eq!(msg.fields.labels(), vec!["Port", "Message Text"]);
        assert_eq!(msg.fields.get("Port"), Some("TEXT_MESSAGE_APP (1)"));
        assert_eq!(msg.fields.get("Message Text"), Some("\"hello mesh\""));
    }

    #[test]
    fn test_text_invalid_utf8_falls_back() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let msg = decoder.decode_data(&data(1, vec![0xff, 0xfe]));
        assert_eq!(msg.fields.get("Payload Data"), Some("bytes(2): fffe"));
        assert!(!msg.fields.contains("Message Text"));
    }

    #[test]
    fn test_traceroute_snr_scaling() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let route = RouteDiscovery {
            route: vec![0x1122_3344, 0xaabb_ccdd],
            snr_towards: vec![40, -8],
            route_back: vec![],
            snr_back: vec![22],
        };
        let msg = decoder.decode_data(&data(70, route.encode_to_vec()));
        assert_eq!(msg.kind, PortKind::Traceroute);
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "Route Path", "Hop Count", "SNR Forward", "SNR Return"]
        );
        assert_eq!(msg.fields.get("Route Path"), Some("!11223344 → !aabbccdd"));
        assert_eq!(msg.fields.get("Hop Count"), Some("2 nodes"));
        assert_eq!(msg.fields.get("SNR Forward"), Some("10.0dB → -2.0dB"));
        assert_eq!(msg.fields.get("SNR Return"), Some("5.5dB"));
    }

    #[test]
    fn test_position_scaling() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let position = Position {
            latitude_i: Some(377_749_000),
            longitude_i: Some(-1_224_194_000),
            altitude: Some(15),
            ground_speed: Some(12),
            sats_in_view: 9,
            ..Default::default()
        };
        let msg = decoder.decode_data(&data(3, position.encode_to_vec()));
        assert_eq!(msg.kind, PortKind::Position);
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "Location", "Maps Link", "Altitude", "Speed", "Satellites"]
        );
        assert_eq!(msg.fields.get("Location"), Some("37.774900, -122.419400"));
        assert_eq!(msg.fields.get("Altitude"), Some("15m"));
        assert_eq!(msg.fields.get("Speed"), Some("12 km/h"));
        assert_eq!(msg.fields.get("Satellites"), Some("9"));
        assert!(msg.fields.get("Maps Link").unwrap().starts_with("https://maps.google.com/?q="));
    }

    #[test]
    fn test_position_manual_fallback() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let lat_i: i32 = 377_749_007;
        let lon_i: i32 = -1_224_194_000;
        let mut payload = lat_i.to_le_bytes().to_vec();
        payload.extend_from_slice(&lon_i.to_le_bytes());
        assert!(Position::decode(payload.as_slice()).is_err());

        let msg = decoder.decode_data(&data(3, payload));
        let expected = format!("{:.6}, {:.6}", lat_i as f64 * 1e-7, lon_i as f64 * 1e-7);
        assert_eq!(msg.fields.get("Location"), Some(expected.as_str()));
    }

    #[test]
    fn test_position_unreadable_gives_raw_summary() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let msg = decoder.decode_data(&data(3, vec![0x0f, 0x01]));
        assert_eq!(msg.fields.labels(), vec!["Port", "Payload Data"]);
        assert_eq!(msg.fields.get("Payload Data"), Some("bytes(2): 0f01"));
    }

    #[test]
    fn test_node_info() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let user = User {
            id: "!a1b2c3d4".to_string(),
            long_name: "Base Station".to_string(),
            short_name: "BASE".to_string(),
            macaddr: vec![0x01, 0x02, 0x03, 0x04, 0x05, 0xab],
            hw_model: 9,
            ..Default::default()
        };
        let msg = decoder.decode_data(&data(4, user.encode_to_vec()));
        assert_eq!(msg.kind, PortKind::NodeInfo);
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "Node ID", "Long Name", "Short Name", "MAC Address", "Hardware"]
        );
        assert_eq!(msg.fields.get("MAC Address"), Some("01:02:03:04:05:ab"));
        assert_eq!(msg.fields.get("Hardware"), Some("9"));
    }

    #[test]
    fn test_device_telemetry() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let telemetry = Telemetry {
            time: 0,
            variant: Some(telemetry::Variant::DeviceMetrics(DeviceMetrics {
                battery_level: Some(87),
                voltage: Some(4.1),
                channel_utilization: None,
                air_util_tx: Some(0.0),
                uptime_seconds: Some(7200),
            })),
        };
        let payload = telemetry.encode_to_vec();
        let size = payload.len();
        let msg = decoder.decode_data(&data(67, payload));
        assert_eq!(msg.kind, PortKind::Telemetry);
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "Battery", "Voltage", "Air Util TX", "Uptime", "Telemetry Size"]
        );
        assert_eq!(msg.fields.get("Battery"), Some("87%"));
        assert_eq!(msg.fields.get("Voltage"), Some("4.10V"));
        assert_eq!(msg.fields.get("Air Util TX"), Some("0.0%"));
        assert_eq!(msg.fields.get("Uptime"), Some("2.0 hours"));
        assert_eq!(msg.fields.get("Telemetry Size"), Some(format!("{} bytes", size).as_str()));
    }

    #[test]
    fn test_environment_telemetry() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let telemetry = Telemetry {
            time: 1_700_000_000,
            variant: Some(telemetry::Variant::EnvironmentMetrics(EnvironmentMetrics {
                temperature: Some(21.5),
                relative_humidity: Some(40.0),
                barometric_pressure: Some(1013.5),
                ..Default::default()
            })),
        };
        let msg = decoder.decode_data(&data(67, telemetry.encode_to_vec()));
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "Temperature", "Humidity", "Pressure", "Telemetry Time", "Telemetry Size"]
        );
        assert_eq!(msg.fields.get("Temperature"), Some("21.5°C"));
        assert_eq!(msg.fields.get("Humidity"), Some("40.0%"));
        assert_eq!(msg.fields.get("Pressure"), Some("1013.5 hPa"));
        assert!(msg.fields.get("Telemetry Time").unwrap().ends_with("(1700000000)"));
    }

    #[test]
    fn test_air_quality_telemetry() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let telemetry = Telemetry {
            time: 0,
            variant: Some(telemetry::Variant::AirQualityMetrics(AirQualityMetrics {
                pm10_standard: Some(4),
                pm25_standard: Some(12),
                pm100_standard: Some(30),
                ..Default::default()
            })),
        };
        let payload = telemetry.encode_to_vec();
        let size = payload.len();
        let msg = decoder.decode_data(&data(67, payload));
        assert_eq!(msg.kind, PortKind::Telemetry);
        assert_eq!(msg.fields.labels(), vec!["Port", "PM1.0", "PM2.5", "PM10", "Telemetry Size"]);
        assert_eq!(msg.fields.get("PM1.0"), Some("4 µg/m³"));
        assert_eq!(msg.fields.get("PM2.5"), Some("12 µg/m³"));
        assert_eq!(msg.fields.get("PM10"), Some("30 µg/m³"));
        assert_eq!(msg.fields.get("Telemetry Size"), Some(format!("{} bytes", size).as_str()));
    }

    #[test]
    fn test_power_telemetry() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let telemetry = Telemetry {
            time: 0,
            variant: Some(telemetry::Variant::PowerMetrics(PowerMetrics {
                ch1_voltage: Some(5.0),
                ch1_current: Some(0.5),
                ch3_voltage: Some(12.25),
                ..Default::default()
            })),
        };
        let msg = decoder.decode_data(&data(67, telemetry.encode_to_vec()));
        assert_eq!(msg.kind, PortKind::Telemetry);
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "CH1 Voltage", "CH1 Current", "CH3 Voltage", "Telemetry Size"]
        );
        assert_eq!(msg.fields.get("CH1 Voltage"), Some("5.00V"));
        assert_eq!(msg.fields.get("CH1 Current"), Some("0.50A"));
        assert_eq!(msg.fields.get("CH3 Voltage"), Some("12.25V"));
        assert!(!msg.fields.contains("CH2 Voltage"));
    }

    #[test]
    fn test_telemetry_manual_fallback() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let mut payload = 4.2f32.to_le_bytes().to_vec();
        payload.extend_from_slice(&21.5f32.to_le_bytes());
        assert!(Telemetry::decode(payload.as_slice()).is_err());

        let msg = decoder.decode_data(&data(67, payload));
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "Voltage", "Temperature", "Telemetry Size", "Parse Status"]
        );
        assert_eq!(msg.fields.get("Voltage"), Some("4.20V"));
        assert_eq!(msg.fields.get("Temperature"), Some("21.5°C"));
    }

    #[test]
    fn test_telemetry_fallback_respects_thresholds() {
        let thresholds = PlausibilityThresholds { voltage_max: 4.0, ..Default::default() };
        let decoder = MessageDecoder::new(&thresholds);
        let mut payload = 4.2f32.to_le_bytes().to_vec();
        payload.extend_from_slice(&21.5f32.to_le_bytes());

        let msg = decoder.decode_data(&data(67, payload));
        assert!(!msg.fields.contains("Voltage"));
        assert_eq!(msg.fields.get("Temperature"), Some("21.5°C"));
    }

    #[test]
    fn test_telemetry_fallback_gives_up() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        // Wire type 7 in the first byte, and neither float is plausible.
        let payload = vec![0x0f, 0xff, 0xff, 0xff, 0x0f, 0xff, 0xff, 0xff];
        let msg = decoder.decode_data(&data(67, payload));
        assert_eq!(msg.fields.labels(), vec!["Port", "Payload Data", "Parse Error"]);
    }

    #[test]
    fn test_routing_error_codes() {
        assert_eq!(routing_error_name(0), "NONE (Success/ACK)");
        assert_eq!(routing_error_name(9), "DUTY_CYCLE_LIMIT");
        assert_eq!(routing_error_name(42), "unknown code 42");
        assert_eq!(routing_error_name(-1), "unknown code -1");

        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let routing = Routing { variant: Some(routing::Variant::ErrorReason(9)) };
        let msg = decoder.decode_data(&data(5, routing.encode_to_vec()));
        assert_eq!(msg.kind, PortKind::Routing);
        assert_eq!(msg.fields.get("Routing Type"), Some("Error Response"));
        assert_eq!(msg.fields.get("Error"), Some("DUTY_CYCLE_LIMIT"));
        assert_eq!(msg.fields.get("Routing Data"), Some("bytes(2): 1809"));
    }

    #[test]
    fn test_routing_simple_ack() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let msg = decoder.decode_data(&data(5, vec![0x20, 0x01]));
        assert_eq!(msg.fields.get("Routing Message"), Some("Simple ACK packet"));

        let empty = decoder.decode_data(&data(5, vec![]));
        assert_eq!(empty.fields.get("Routing Message"), Some("Simple ACK packet"));
    }

    #[test]
    fn test_decrypted_routing_reply() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let routing = Routing {
            variant: Some(routing::Variant::RouteReply(RouteDiscovery {
                route: vec![1, 2],
                snr_towards: vec![12],
                route_back: vec![2, 1],
                snr_back: vec![-4],
            })),
        };
        let len = routing.encode_to_vec().len();
        let msg = decoder.decode_routing(&routing, len);
        assert_eq!(
            msg.fields.labels(),
            vec!["Message Type", "Routing Type", "Forward Route", "Return Route", "Forward SNR", "Return SNR"]
        );
        assert_eq!(msg.fields.get("Message Type"), Some("ROUTING"));
        assert_eq!(msg.fields.get("Return Route"), Some("!00000002 → !00000001"));
        assert_eq!(msg.fields.get("Return SNR"), Some("-1.0dB"));
    }

    #[test]
    fn test_unknown_port_and_extras() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let d = Data {
            portnum: 500,
            payload: vec![1, 2, 3],
            want_response: true,
            dest: 0x0000_0abc,
            request_id: 0xdead_beef,
            ..Default::default()
        };
        let msg = decoder.decode_data(&d);
        assert_eq!(msg.kind, PortKind::Other(500));
        assert_eq!(
            msg.fields.labels(),
            vec!["Port", "Payload Data", "Wants Response", "Destination", "Request ID"]
        );
        assert_eq!(msg.fields.get("Port"), Some("UNKNOWN (500)"));
        assert_eq!(msg.fields.get("Destination"), Some("!00000abc"));
        assert_eq!(msg.fields.get("Request ID"), Some("0xdeadbeef"));
        assert_eq!(port_label(70), "TRACEROUTE_APP (70)");
    }

    #[test]
    fn test_fields_serialize_in_order() {
        let thresholds = PlausibilityThresholds::default();
        let decoder = MessageDecoder::new(&thresholds);
        let msg = decoder.decode_data(&data(1, b"x".to_vec()));
        let json = serde_json::to_string(&msg.fields).unwrap();
        assert_eq!(json, r#"{"Port":"TEXT_MESSAGE_APP (1)","Message Text":"\"x\""}"#);
    }

    #[test]
    fn test_uptime_rendering() {
        assert_eq!(format_uptime(7200), "2.0 hours");
        assert_eq!(format_uptime(172_800), "2.0 days");
    }
}
