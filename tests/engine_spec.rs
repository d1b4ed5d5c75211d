use simple_labels::models::*;
use simple_labels::scene::{FixedSessionPath, RenderCall, RenderLog, SceneRegistry};
use simple_labels::sync::RoleKind;
use simple_labels::{EngineConfig, LabelEngine};
use speculate2::speculate;

fn apply_call(id: &str, text: &str) -> RenderCall {
    RenderCall::Apply {
        id: id.to_string(),
        text: text.to_string(),
    }
}

fn payload(id: &str, text: Option<&str>, size: Option<i32>) -> LabelPayload {
    LabelPayload {
        guid: id.to_string(),
        label_text: text.map(str::to_string),
        label_size: size,
        label_color: None,
        font_size: None,
        font_color: None,
    }
}

speculate! {
    before {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = EngineConfig {
            mod_data_root: Some(dir.path().join("mods")),
            ..Default::default()
        };
        let scene = SceneRegistry::new();
        let renders = RenderLog::new();
        let mut engine = LabelEngine::new(
            &config,
            scene.clone(),
            renders.clone(),
            FixedSessionPath::new(dir.path().join("session")),
        );
    }

    describe "create_label" {
        it "fills omitted fields from defaults" {
            assert!(engine.create_label(CreateLabelInput::new("a", "Seeds")));

            let record = engine.get("a").expect("label not created");
            assert_eq!(record.text, "Seeds");
            assert_eq!(record.label_color, "FFFFFF");
            assert_eq!(record.label_size, 8);
            assert_eq!(record.font_size, 24);
            assert_eq!(record.font_color, "000000");
            assert_eq!(record.binding, None);
        }

        it "is a no-op for a duplicate identifier" {
            engine.create_label(CreateLabelInput::new("a", "First"));

            assert!(!engine.create_label(CreateLabelInput::new("a", "Second")));
            assert_eq!(engine.get("a").unwrap().text, "First");
        }

        it "rejects an empty identifier" {
            assert!(!engine.create_label(CreateLabelInput::new("", "Nothing")));
            assert!(engine.store().is_empty());
        }

        it "falls back to the default color and clamps the size" {
            engine.create_label(CreateLabelInput {
                label_color: Some("purple".to_string()),
                label_size: Some(0),
                font_color: Some("#abcdef".to_string()),
                ..CreateLabelInput::new("a", "Seeds")
            });

            let record = engine.get("a").unwrap();
            assert_eq!(record.label_color, "FFFFFF");
            assert_eq!(record.label_size, 1);
            assert_eq!(record.font_color, "ABCDEF");
        }

        it "draws only bound labels with text" {
            engine.create_label(CreateLabelInput::new("a", "Bound").with_binding(ObjectHandle(1)));
            engine.create_label(CreateLabelInput::new("b", "Unbound"));
            engine.create_label(CreateLabelInput::new("c", "").with_binding(ObjectHandle(3)));

            assert_eq!(renders.calls(), vec![apply_call("a", "Bound")]);
        }
    }

    describe "update_label" {
        it "changes only the supplied fields" {
            engine.create_label(CreateLabelInput {
                label_color: Some("FF0000".to_string()),
                label_size: Some(12),
                ..CreateLabelInput::new("a", "Old")
            });

            assert!(engine.update_label("a", UpdateLabelInput::text("X"), ChangeOrigin::Local));

            let record = engine.get("a").unwrap();
            assert_eq!(record.text, "X");
            assert_eq!(record.label_color, "FF0000");
            assert_eq!(record.label_size, 12);
        }

        it "ignores untracked labels" {
            assert!(!engine.update_label("missing", UpdateLabelInput::text("X"), ChangeOrigin::Local));
            assert!(engine.get("missing").is_none());
        }

        it "redraws a bound label" {
            engine.create_label(CreateLabelInput::new("a", "Old").with_binding(ObjectHandle(1)));
            renders.clear();

            engine.update_label("a", UpdateLabelInput::text("New"), ChangeOrigin::Local);

            assert_eq!(renders.calls(), vec![apply_call("a", "New")]);
        }
    }

    describe "remove_label" {
        it "clears the text and keeps the record" {
            engine.create_label(CreateLabelInput::new("a", "Seeds").with_binding(ObjectHandle(1)));
            renders.clear();

            assert!(engine.remove_label("a"));

            assert_eq!(engine.get("a").unwrap().text, "");
            assert_eq!(renders.calls(), vec![RenderCall::Remove { id: "a".to_string() }]);
        }
    }

    describe "bind_scene_object" {
        it "binds and draws a label with text" {
            engine.create_label(CreateLabelInput::new("a", "Seeds"));

            assert!(engine.bind_scene_object("a", ObjectHandle(9)));

            assert_eq!(engine.get("a").unwrap().binding, Some(ObjectHandle(9)));
            assert_eq!(renders.calls(), vec![apply_call("a", "Seeds")]);
        }

        it "binds without drawing an empty label" {
            engine.create_label(CreateLabelInput::new("a", ""));

            engine.bind_scene_object("a", ObjectHandle(9));

            assert_eq!(engine.get("a").unwrap().binding, Some(ObjectHandle(9)));
            assert!(renders.calls().is_empty());
        }

        it "ignores untracked labels" {
            assert!(!engine.bind_scene_object("missing", ObjectHandle(9)));
            assert!(engine.store().is_empty());
        }
    }

    describe "apply_network_batch" {
        it "creates unknown labels and updates known ones" {
            engine.create_label(CreateLabelInput {
                label_size: Some(5),
                ..CreateLabelInput::new("a", "Old")
            });

            let mut batch = LabelMap::new();
            batch.insert("a".to_string(), payload("a", Some("Updated"), None));
            batch.insert("b".to_string(), payload("b", Some("Created"), Some(14)));
            engine.apply_network_batch(batch);

            let a = engine.get("a").unwrap();
            assert_eq!(a.text, "Updated");
            assert_eq!(a.label_size, 5);
            let b = engine.get("b").unwrap();
            assert_eq!(b.text, "Created");
            assert_eq!(b.label_size, 14);
            assert_eq!(b.font_size, 24);
        }

        it "force refreshes every bound label" {
            engine.create_label(CreateLabelInput::new("a", "Seeds").with_binding(ObjectHandle(1)));
            engine.create_label(CreateLabelInput::new("b", "Loose"));
            renders.clear();

            engine.apply_network_batch(LabelMap::new());

            assert_eq!(renders.calls(), vec![RenderCall::Refresh { id: "a".to_string() }]);
        }
    }

    describe "resolve_all_bindings" {
        it "binds labels whose objects are live" {
            engine.create_label(CreateLabelInput::new("a", "Seeds"));
            engine.create_label(CreateLabelInput::new("b", "Soil"));
            scene.spawn("a", ObjectHandle(1));

            engine.resolve_all_bindings();

            assert_eq!(engine.get("a").unwrap().binding, Some(ObjectHandle(1)));
            assert_eq!(engine.get("b").unwrap().binding, None);
            assert_eq!(renders.calls(), vec![apply_call("a", "Seeds")]);
        }

        it "clears bindings to objects that are gone" {
            scene.spawn("a", ObjectHandle(1));
            engine.create_label(CreateLabelInput::new("a", "Seeds").with_binding(ObjectHandle(1)));
            scene.despawn("a");

            engine.resolve_all_bindings();

            let record = engine.get("a").expect("record must survive");
            assert_eq!(record.binding, None);
            assert_eq!(record.text, "Seeds");
        }

        it "rebinds when an object comes back with a new handle" {
            engine.create_label(CreateLabelInput::new("a", "Seeds").with_binding(ObjectHandle(1)));
            scene.spawn("a", ObjectHandle(2));

            engine.resolve_all_bindings();

            assert_eq!(engine.get("a").unwrap().binding, Some(ObjectHandle(2)));
        }

        it "redraws labels that are already bound" {
            scene.spawn("a", ObjectHandle(1));
            engine.create_label(CreateLabelInput::new("a", "Seeds").with_binding(ObjectHandle(1)));
            renders.clear();

            engine.resolve_all_bindings();

            assert_eq!(renders.calls(), vec![apply_call("a", "Seeds")]);
        }
    }

    describe "focus" {
        it "is cleared when the session ends" {
            engine.create_label(CreateLabelInput::new("a", "Seeds"));
            engine.focus("a");
            assert_eq!(engine.focused(), Some("a"));

            engine.terminate();

            assert!(engine.focused().is_none());
            assert!(engine.store().is_empty());
        }
    }

    describe "without replication" {
        it "edits work and ticks do nothing" {
            engine.create_label(CreateLabelInput::new("a", "Seeds"));
            engine.tick(std::time::Instant::now());

            let status = engine.sync_status();
            assert!(!status.available);
            assert_eq!(status.role, RoleKind::Offline);
            assert_eq!(engine.get("a").unwrap().text, "Seeds");
        }
    }
}
