use std::path::Path;
use std::time::{Duration, Instant};

use simple_labels::error::TransportError;
use simple_labels::models::*;
use simple_labels::net::memory::{MemoryLobby, MemoryPeer};
use simple_labels::net::{
    Replication, ReplicationBridge, LAST_LABEL_CHANGE, REQUEST_LABEL_SYNC, SYNCED_LABELS,
};
use simple_labels::scene::{FixedSessionPath, RenderLog, SceneRegistry};
use simple_labels::sync::RoleKind;
use simple_labels::{EngineConfig, LabelEngine};
use speculate2::speculate;

fn sync_config(root: &Path) -> EngineConfig {
    EngineConfig {
        mod_data_root: Some(root.join("mods")),
        replication_enabled: true,
        retry_attempts: 3,
        ..Default::default()
    }
}

fn peer_engine(config: &EngineConfig, scene: &SceneRegistry, peer: MemoryPeer) -> LabelEngine {
    LabelEngine::new(
        config,
        scene.clone(),
        RenderLog::new(),
        FixedSessionPath::none(),
    )
    .with_replication(Replication::from_bridge(peer))
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn change(id: &str, text: &str) -> String {
    LabelPayload {
        guid: id.to_string(),
        label_text: Some(text.to_string()),
        ..Default::default()
    }
    .encode()
    .expect("payload encodes")
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = sync_config(dir.path());
        let scene = SceneRegistry::new();
        let lobby = MemoryLobby::new();
        let t0 = Instant::now();
    }

    describe "a host with two clients" {
        before {
            let host_peer = lobby.join();
            let a_peer = lobby.join();
            let b_peer = lobby.join();
            let (host_id, a_id, b_id) = (host_peer.id(), a_peer.id(), b_peer.id());

            let mut host = peer_engine(&config, &scene, host_peer);
            let mut a = peer_engine(&config, &scene, a_peer);
            let mut b = peer_engine(&config, &scene, b_peer);

            host.tick(t0);
            a.tick(t0);
            b.tick(t0);
        }

        it "selects roles from the lobby" {
            assert_eq!(host.sync_status().role, RoleKind::Host);
            assert_eq!(host.sync_status().known_peers, 2);
            assert_eq!(a.sync_status().role, RoleKind::Client);
            assert_eq!(b.sync_status().role, RoleKind::Client);
        }

        it "converges on a client edit" {
            scene.spawn("x", ObjectHandle(1));
            a.create_label(CreateLabelInput::new("x", "Seeds").with_binding(ObjectHandle(1)));

            let t1 = t0 + ms(100);
            host.tick(t1);
            a.tick(t1);
            b.tick(t1);

            for engine in [&host, &a, &b] {
                let record = engine.get("x").expect("label did not converge");
                assert_eq!(record.text, "Seeds");
                assert_eq!(record.binding, Some(ObjectHandle(1)));
            }
            let synced = lobby.host_value(SYNCED_LABELS).expect("host never published");
            assert!(decode_label_map(&synced).unwrap().contains_key("x"));
        }

        it "converges on two client edits in the same tick" {
            scene.spawn("x", ObjectHandle(1));
            scene.spawn("y", ObjectHandle(2));
            a.create_label(CreateLabelInput::new("x", "From a").with_binding(ObjectHandle(1)));
            b.create_label(CreateLabelInput::new("y", "From b").with_binding(ObjectHandle(2)));

            let t1 = t0 + ms(100);
            host.tick(t1);

            let synced = lobby.host_value(SYNCED_LABELS).expect("host never published");
            let keys: Vec<String> = decode_label_map(&synced).unwrap().into_keys().collect();
            assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);

            a.tick(t1);
            b.tick(t1);

            assert_eq!(a.get("y").expect("a missed b's edit").text, "From b");
            assert_eq!(b.get("x").expect("b missed a's edit").text, "From a");
        }

        it "does not echo applied changes back" {
            scene.spawn("x", ObjectHandle(1));
            a.create_label(CreateLabelInput::new("x", "Seeds").with_binding(ObjectHandle(1)));

            for step in 1..=20 {
                let now = t0 + ms(100 * step);
                host.tick(now);
                a.tick(now);
                b.tick(now);
            }

            assert_eq!(lobby.write_count(a_id, LAST_LABEL_CHANGE), 1);
            assert_eq!(lobby.write_count(b_id, LAST_LABEL_CHANGE), 0);
            assert_eq!(lobby.write_count(host_id, LAST_LABEL_CHANGE), 1);
        }

        it "sends a host edit to every client" {
            scene.spawn("x", ObjectHandle(1));
            host.create_label(CreateLabelInput::new("x", "Old").with_binding(ObjectHandle(1)));
            let t1 = t0 + ms(100);
            host.tick(t1);
            a.tick(t1);
            b.tick(t1);

            host.update_label("x", UpdateLabelInput::text("New"), ChangeOrigin::Local);
            let t2 = t0 + ms(200);
            host.tick(t2);
            a.tick(t2);
            b.tick(t2);

            assert_eq!(a.get("x").unwrap().text, "New");
            assert_eq!(b.get("x").unwrap().text, "New");
            assert_eq!(lobby.write_count(a_id, LAST_LABEL_CHANGE), 0);
            assert_eq!(lobby.write_count(b_id, LAST_LABEL_CHANGE), 0);
        }

        it "keeps unbound labels out of the full state" {
            host.create_label(CreateLabelInput::new("loose", "Nowhere"));
            host.tick(t0 + ms(100));

            let synced = lobby.host_value(SYNCED_LABELS).expect("host never published");
            assert!(!decode_label_map(&synced).unwrap().contains_key("loose"));
        }

        it "promotes a client that takes over as host" {
            scene.spawn("x", ObjectHandle(1));
            a.create_label(CreateLabelInput::new("x", "Seeds").with_binding(ObjectHandle(1)));
            let t1 = t0 + ms(100);
            host.tick(t1);
            a.tick(t1);
            b.tick(t1);

            lobby.leave(host_id);
            a.update_label("x", UpdateLabelInput::text("Moved"), ChangeOrigin::Local);
            let t2 = t0 + ms(200);
            a.tick(t2);
            b.tick(t2);

            assert_eq!(a.sync_status().role, RoleKind::Host);
            assert_eq!(b.get("x").unwrap().text, "Moved");
        }
    }

    describe "a late joiner" {
        it "catches up from the host's full state" {
            let host_peer = lobby.join();
            let mut host = peer_engine(&config, &scene, host_peer);
            scene.spawn("x", ObjectHandle(1));
            scene.spawn("y", ObjectHandle(2));
            host.create_label(CreateLabelInput::new("x", "One").with_binding(ObjectHandle(1)));
            host.create_label(CreateLabelInput::new("y", "Two").with_binding(ObjectHandle(2)));
            host.tick(t0);

            let late_peer = lobby.join();
            let late_id = late_peer.id();
            let mut late = peer_engine(&config, &scene, late_peer);
            host.tick(t0 + ms(100));
            late.tick(t0 + ms(100));

            assert_eq!(late.store().len(), 2);
            assert_eq!(late.get("y").unwrap().text, "Two");
            assert_eq!(late.get("y").unwrap().binding, Some(ObjectHandle(2)));
            assert_eq!(late.sync_status().retry_attempt, None);
            assert_eq!(lobby.write_count(late_id, REQUEST_LABEL_SYNC), 0);
        }
    }

    describe "catch-up retries" {
        before {
            let mut silent_host = lobby.join();
            let client_peer = lobby.join();
            let client_id = client_peer.id();
            let mut client = peer_engine(&config, &scene, client_peer);
            client.tick(t0);
        }

        it "stops after the configured number of attempts" {
            for second in 1..=20 {
                client.tick(t0 + Duration::from_secs(second));
            }

            assert_eq!(lobby.write_count(client_id, REQUEST_LABEL_SYNC), 3);
            assert_eq!(client.sync_status().retry_attempt, None);
            assert!(client.store().is_empty());
        }

        it "counts attempts while running" {
            client.tick(t0 + Duration::from_secs(2));

            assert_eq!(client.sync_status().retry_attempt, Some(1));
        }

        it "ends once the host publishes" {
            client.tick(t0 + Duration::from_secs(2));

            let mut state = LabelMap::new();
            state.insert(
                "x".to_string(),
                LabelPayload {
                    guid: "x".to_string(),
                    label_text: Some("Late".to_string()),
                    ..Default::default()
                },
            );
            silent_host
                .set_host_value(SYNCED_LABELS, &encode_label_map(&state).unwrap())
                .unwrap();

            for second in 3..=20 {
                client.tick(t0 + Duration::from_secs(second));
            }

            assert_eq!(client.get("x").unwrap().text, "Late");
            assert_eq!(lobby.write_count(client_id, REQUEST_LABEL_SYNC), 1);
        }

        it "is abandoned when the client becomes host" {
            client.tick(t0 + Duration::from_secs(2));
            lobby.set_host(client_id);

            for second in 3..=20 {
                client.tick(t0 + Duration::from_secs(second));
            }

            assert_eq!(client.sync_status().role, RoleKind::Host);
            assert_eq!(lobby.write_count(client_id, REQUEST_LABEL_SYNC), 1);
        }
    }

    describe "the host's slot polling" {
        before {
            let host_peer = lobby.join();
            let host_id = host_peer.id();
            let mut member = lobby.join();
            let mut other = lobby.join();
            let mut host = peer_engine(&config, &scene, host_peer);
            host.tick(t0);
        }

        it "drops malformed changes" {
            member.set_local_value(LAST_LABEL_CHANGE, "not json").unwrap();
            host.tick(t0 + ms(100));
            other.set_local_value(LAST_LABEL_CHANGE, r#"{"LabelText": "no id"}"#).unwrap();
            host.tick(t0 + ms(200));

            assert!(host.store().is_empty());
            assert_eq!(lobby.write_count(host_id, LAST_LABEL_CHANGE), 0);

            member.set_local_value(LAST_LABEL_CHANGE, &change("x", "Fine")).unwrap();
            host.tick(t0 + ms(300));

            assert_eq!(host.get("x").unwrap().text, "Fine");
        }

        it "applies each slot value once" {
            member.set_local_value(LAST_LABEL_CHANGE, &change("x", "Once")).unwrap();

            for step in 1..=10 {
                host.tick(t0 + ms(100 * step));
            }

            assert_eq!(lobby.write_count(host_id, LAST_LABEL_CHANGE), 1);
        }

        it "rate limits sync requests" {
            let baseline = lobby.write_count(host_id, SYNCED_LABELS);

            member.set_local_value(REQUEST_LABEL_SYNC, "r1").unwrap();
            host.tick(t0 + ms(100));
            assert_eq!(lobby.write_count(host_id, SYNCED_LABELS), baseline + 1);

            other.set_local_value(REQUEST_LABEL_SYNC, "r2").unwrap();
            host.tick(t0 + ms(200));
            host.tick(t0 + ms(1_000));
            assert_eq!(lobby.write_count(host_id, SYNCED_LABELS), baseline + 1);

            host.tick(t0 + ms(2_200));
            assert_eq!(lobby.write_count(host_id, SYNCED_LABELS), baseline + 2);
        }

        it "republishes on the full sync interval" {
            let baseline = lobby.write_count(host_id, SYNCED_LABELS);

            host.tick(t0 + Duration::from_secs(29));
            assert_eq!(lobby.write_count(host_id, SYNCED_LABELS), baseline);

            host.tick(t0 + Duration::from_secs(31));
            assert_eq!(lobby.write_count(host_id, SYNCED_LABELS), baseline + 1);
        }
    }

    describe "out of range intervals" {
        it "never fire instead of failing" {
            let config = EngineConfig {
                full_sync_interval_ms: u64::MAX,
                retry_interval_ms: u64::MAX,
                ..config.clone()
            };
            let host_peer = lobby.join();
            let host_id = host_peer.id();
            let client_peer = lobby.join();
            let client_id = client_peer.id();
            let mut host = peer_engine(&config, &scene, host_peer);
            let mut client = peer_engine(&config, &scene, client_peer);

            client.tick(t0);
            for second in 1..=60 {
                client.tick(t0 + Duration::from_secs(second));
            }
            assert_eq!(lobby.write_count(client_id, REQUEST_LABEL_SYNC), 0);

            host.tick(t0);
            let baseline = lobby.write_count(host_id, SYNCED_LABELS);
            host.tick(t0 + Duration::from_secs(3_600));
            assert_eq!(lobby.write_count(host_id, SYNCED_LABELS), baseline);
        }
    }

    describe "without replication" {
        it "ignores a bridge when the config turns replication off" {
            let peer = lobby.join();
            let config = EngineConfig {
                replication_enabled: false,
                ..config.clone()
            };
            let mut engine = peer_engine(&config, &scene, peer);

            engine.create_label(CreateLabelInput::new("x", "Solo"));
            engine.tick(t0);

            assert!(!engine.sync_status().available);
            assert!(lobby.writes().is_empty());
            assert_eq!(engine.get("x").unwrap().text, "Solo");
        }

        it "runs single-peer when the transport cannot start" {
            let mut engine = LabelEngine::new(
                &config,
                scene.clone(),
                RenderLog::new(),
                FixedSessionPath::none(),
            )
            .with_replication(Replication::connect(|| {
                Err(TransportError::Unavailable("no lobby library".into()))
            }));

            engine.create_label(CreateLabelInput::new("x", "Solo"));
            engine.tick(t0);

            let status = engine.sync_status();
            assert!(!status.available);
            assert_eq!(status.role, RoleKind::Offline);
            assert_eq!(engine.get("x").unwrap().text, "Solo");
        }
    }
}
