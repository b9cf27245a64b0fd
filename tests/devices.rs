mod common;

use common::{id, ParentMap, Recorder};
use routed_input::{
    axis::StylusPoint,
    events::{
        InputArgs, MouseButtonEventArgs, Phase, RoutedEvent, StylusEventArgs,
        TextCompositionEventArgs,
    },
    keyboard::VirtualKey,
    mouse::{CaptureMode, MouseButton, MouseButtonState},
    report::{
        InputMode, InputReport, RawKeyboardActions, RawKeyboardInput, RawMouseActions,
        RawMouseInput, RawStylusActions, RawStylusInput, RawTextFlags, RawTextInput, Timestamp,
    },
    stylus::StylusPhase,
    system::SnapshotState,
    util::Point,
    Builder, InputManager, SourceId, StylusDeviceId, TabletId,
};
use smallvec::smallvec;

/// 1 is the window, 2 its left half, 3 its right half.
fn window() -> ParentMap {
    ParentMap::new()
        .child(1, 2)
        .child(1, 3)
        .region(1, [0.0, 0.0, 100.0, 100.0])
        .region(2, [0.0, 0.0, 50.0, 100.0])
        .region(3, [50.0, 0.0, 50.0, 100.0])
}

fn mouse(
    manager: &mut InputManager,
    tree: &ParentMap,
    actions: RawMouseActions,
    x: f64,
    millis: u64,
) -> bool {
    let report = InputReport::mouse(
        SourceId::new(1),
        InputMode::Foreground,
        Timestamp::from_millis(millis),
        RawMouseInput {
            actions,
            position: Point::new(x, 10.0),
            ..RawMouseInput::default()
        },
    )
    .unwrap();
    manager.process_input(tree, report)
}

fn keyboard(
    manager: &mut InputManager,
    tree: &ParentMap,
    actions: RawKeyboardActions,
    key: VirtualKey,
) {
    let report = InputReport::keyboard(
        SourceId::new(1),
        InputMode::Foreground,
        Timestamp::default(),
        RawKeyboardInput {
            actions,
            virtual_key: key,
            ..RawKeyboardInput::default()
        },
    )
    .unwrap();
    manager.process_input(tree, report);
}

const PEN: StylusDeviceId = StylusDeviceId::new(3);

fn stylus(manager: &mut InputManager, tree: &ParentMap, actions: RawStylusActions, x: f64) {
    let report = InputReport::stylus(
        SourceId::new(1),
        InputMode::Foreground,
        Timestamp::default(),
        RawStylusInput {
            actions,
            tablet: TabletId::new(1),
            stylus: PEN,
            inverted: false,
            points: smallvec![StylusPoint::at(Point::new(x, 10.0))],
        },
    )
    .unwrap();
    manager.process_input(tree, report);
}

/// Records every stylus event bubbling through the window as `"<event>@<source>"`.
fn watch_stylus(manager: &mut InputManager) -> Recorder {
    let recorder = Recorder::new();
    for event in [
        RoutedEvent::StylusInRange,
        RoutedEvent::StylusDown,
        RoutedEvent::StylusMove,
        RoutedEvent::StylusInAirMove,
        RoutedEvent::StylusUp,
        RoutedEvent::StylusOutOfRange,
    ] {
        let r = recorder.clone();
        manager
            .router_mut()
            .add_handler(id(1), event, Phase::Bubble, move |_, args: &mut StylusEventArgs| {
                let source = args.source().map_or(0, |source| source.get());
                r.push(format!("{}@{source}", args.routed_event().as_ref()));
            });
    }
    recorder
}

#[test]
fn test_inactive_mouse_reports_released() {
    let tree = window();
    let system = SnapshotState::new();
    system.set_button(MouseButton::Left, true);
    let mut manager = Builder::new().build(system.clone());

    assert_eq!(
        manager.mouse().button_state_from_system(manager.system(), MouseButton::Left),
        MouseButtonState::Released,
        "an inactive mouse never reports pressed"
    );
    mouse(&mut manager, &tree, RawMouseActions::ABSOLUTE_MOVE, 10.0, 0);
    assert!(manager.mouse().is_active());
    assert_eq!(
        manager.mouse().button_state(MouseButton::Left),
        MouseButtonState::Pressed,
        "synced on activation"
    );
    assert_eq!(
        manager.mouse().button_state_from_system(manager.system(), MouseButton::Left),
        MouseButtonState::Pressed
    );

    mouse(&mut manager, &tree, RawMouseActions::DEACTIVATE, 10.0, 1);
    assert!(!manager.mouse().is_active());
    assert_eq!(manager.mouse().button_state(MouseButton::Left), MouseButtonState::Released);
}

#[test]
fn test_capture_redirects_mouse_input() {
    let tree = window();
    let mut manager = Builder::new().build(SnapshotState::new());
    let recorder = Recorder::new();
    for element in [2, 3] {
        recorder.watch(manager.router_mut(), element, RoutedEvent::MouseMove);
        recorder.watch(manager.router_mut(), element, RoutedEvent::LostMouseCapture);
    }

    manager.capture_mouse(&tree, Some(id(2)), CaptureMode::Element);
    assert_eq!(manager.mouse().captured(), Some(id(2)));
    mouse(&mut manager, &tree, RawMouseActions::ABSOLUTE_MOVE, 75.0, 0);
    assert_eq!(recorder.take(), ["MouseMove@2:Tunnel", "MouseMove@2:Bubble"]);
    assert_eq!(manager.mouse().directly_over(), Some(id(3)));

    manager.capture_mouse(&tree, None, CaptureMode::None);
    assert_eq!(recorder.take(), ["LostMouseCapture@2:Bubble"]);
    mouse(&mut manager, &tree, RawMouseActions::ABSOLUTE_MOVE, 76.0, 1);
    assert_eq!(recorder.take(), ["MouseMove@3:Tunnel", "MouseMove@3:Bubble"]);

    // The platform can take capture away as part of a report.
    manager.capture_mouse(&tree, Some(id(2)), CaptureMode::Element);
    mouse(
        &mut manager,
        &tree,
        RawMouseActions::CANCEL_CAPTURE | RawMouseActions::ABSOLUTE_MOVE,
        77.0,
        2,
    );
    assert_eq!(
        recorder.take(),
        ["LostMouseCapture@2:Bubble", "MouseMove@3:Tunnel", "MouseMove@3:Bubble"]
    );
    assert_eq!(manager.mouse().captured(), None);
}

#[test]
fn test_subtree_capture_keeps_descendants() {
    let tree = window().child(2, 4).region(4, [10.0, 0.0, 10.0, 20.0]);
    let mut manager = Builder::new().build(SnapshotState::new());
    let recorder = Recorder::new();
    for element in [2, 4] {
        recorder.watch(manager.router_mut(), element, RoutedEvent::MouseDown);
    }
    manager.capture_mouse(&tree, Some(id(2)), CaptureMode::SubTree);

    mouse(&mut manager, &tree, RawMouseActions::BUTTON1_PRESS, 15.0, 0);
    assert_eq!(
        recorder.take(),
        ["MouseDown@2:Tunnel", "MouseDown@4:Tunnel", "MouseDown@4:Bubble", "MouseDown@2:Bubble"],
        "over a descendant"
    );
    mouse(&mut manager, &tree, RawMouseActions::BUTTON1_RELEASE, 15.0, 1);
    mouse(&mut manager, &tree, RawMouseActions::BUTTON1_PRESS, 90.0, 2);
    assert_eq!(
        recorder.take(),
        ["MouseDown@2:Tunnel", "MouseDown@2:Bubble"],
        "outside, back to the captor"
    );
}

#[test]
fn test_click_count_needs_time_and_place() {
    let tree = window();
    let mut manager = Builder::new().build(SnapshotState::new());
    let clicks = Recorder::new();
    let c = clicks.clone();
    manager.router_mut().add_handler(
        id(1),
        RoutedEvent::MouseDown,
        Phase::Bubble,
        move |_, args: &mut MouseButtonEventArgs| {
            c.push(format!("{:?}x{}", args.button, args.click_count));
        },
    );

    let click = |manager: &mut InputManager, x: f64, millis: u64| {
        mouse(manager, &tree, RawMouseActions::BUTTON1_PRESS, x, millis);
        mouse(manager, &tree, RawMouseActions::BUTTON1_RELEASE, x, millis + 10);
    };
    click(&mut manager, 20.0, 0);
    click(&mut manager, 21.0, 200);
    click(&mut manager, 21.0, 1_000);
    click(&mut manager, 60.0, 1_100);
    mouse(&mut manager, &tree, RawMouseActions::BUTTON2_PRESS, 60.0, 1_200);

    assert_eq!(clicks.take(), ["Leftx1", "Leftx2", "Leftx1", "Leftx1", "Rightx1"]);
}

#[test]
fn test_stylus_contact_synthesizes_range() {
    let tree = window();
    let mut manager = Builder::new().build(SnapshotState::new());
    let recorder = watch_stylus(&mut manager);

    stylus(&mut manager, &tree, RawStylusActions::DOWN, 75.0);
    assert_eq!(recorder.take(), ["StylusInRange@3", "StylusDown@3"]);
    assert_eq!(manager.stylus().phase(PEN), StylusPhase::Down);
    assert_eq!(manager.stylus().current_stylus(), Some(PEN));

    stylus(&mut manager, &tree, RawStylusActions::MOVE, 25.0);
    assert_eq!(recorder.take(), ["StylusMove@2"]);
    assert_eq!(manager.stylus().position(PEN), Some(Point::new(25.0, 10.0)));

    stylus(&mut manager, &tree, RawStylusActions::OUT_OF_RANGE, 25.0);
    assert_eq!(recorder.take(), ["StylusUp@2", "StylusOutOfRange@2"]);
    assert_eq!(manager.stylus().phase(PEN), StylusPhase::OutOfRange);
    assert_eq!(manager.stylus().current_stylus(), None);
}

#[test]
fn test_stylus_capture_needs_range() {
    let tree = window();
    let mut manager = Builder::new().build(SnapshotState::new());
    let recorder = watch_stylus(&mut manager);

    assert!(!manager.stylus_mut().capture(PEN, Some(id(2))));
    stylus(&mut manager, &tree, RawStylusActions::IN_RANGE, 75.0);
    assert_eq!(recorder.take(), ["StylusInRange@3"]);

    assert!(manager.stylus_mut().capture(PEN, Some(id(2))));
    stylus(&mut manager, &tree, RawStylusActions::IN_AIR_MOVE, 80.0);
    assert_eq!(recorder.take(), ["StylusInAirMove@2"]);
    assert_eq!(manager.stylus().captured(PEN), Some(id(2)));

    stylus(&mut manager, &tree, RawStylusActions::OUT_OF_RANGE, 80.0);
    assert_eq!(recorder.take(), ["StylusOutOfRange@2"]);
    assert_eq!(manager.stylus().captured(PEN), None, "leaving range ends capture");
}

#[test]
fn test_text_goes_to_focus() {
    let tree = window();
    let mut manager = Builder::new().build(SnapshotState::new());
    let typed = Recorder::new();
    let t = typed.clone();
    manager.router_mut().add_handler(
        id(1),
        RoutedEvent::TextInput,
        Phase::Bubble,
        move |_, args: &mut TextCompositionEventArgs| {
            t.push(format!("{}@{}", args.text, args.source().map_or(0, |source| source.get())));
        },
    );
    let text = |c| {
        InputReport::text(
            SourceId::new(1),
            InputMode::Foreground,
            Timestamp::default(),
            RawTextInput {
                character: c,
                flags: RawTextFlags::empty(),
            },
        )
        .unwrap()
    };

    manager.process_input(&tree, text('a'));
    assert!(typed.take().is_empty(), "no focus, nowhere to type");
    manager.focus(&tree, Some(id(2)));
    manager.process_input(&tree, text('b'));
    assert_eq!(typed.take(), ["b@2"]);
}

#[test]
fn test_deactivation_releases_keys_but_keeps_toggles() {
    let tree = window();
    let mut manager = Builder::new().build(SnapshotState::new());

    keyboard(&mut manager, &tree, RawKeyboardActions::ACTIVATE, VirtualKey::default());
    assert!(manager.keyboard().is_active());
    keyboard(&mut manager, &tree, RawKeyboardActions::KEY_DOWN, VirtualKey::CAPS_LOCK);
    keyboard(&mut manager, &tree, RawKeyboardActions::KEY_UP, VirtualKey::CAPS_LOCK);
    keyboard(&mut manager, &tree, RawKeyboardActions::KEY_DOWN, VirtualKey::A);
    assert!(manager.keyboard().is_key_toggled(VirtualKey::CAPS_LOCK));
    assert!(manager.keyboard().is_key_down(VirtualKey::A));

    keyboard(&mut manager, &tree, RawKeyboardActions::DEACTIVATE, VirtualKey::default());
    assert!(!manager.keyboard().is_active());
    assert!(!manager.keyboard().is_key_down(VirtualKey::A));
    assert!(manager.keyboard().is_key_toggled(VirtualKey::CAPS_LOCK));
}
