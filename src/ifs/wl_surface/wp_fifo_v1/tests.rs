use {
    crate::{
        client::PostedError,
        config::Config,
        ifs::wl_surface::{
            SurfaceCommitListener, WlSurface,
            wp_fifo_v1::{FifoDestroyListener, FifoState, WpFifoV1},
        },
        it::testrun::{TestClient, TestRun, TestSurface},
        utils::{event_listener::EventListener, numcell::NumCell},
        wire::{self, WlBufferId, wp_fifo_manager_v1::ALREADY_EXISTS},
    },
    std::{
        cell::RefCell,
        rc::{Rc, Weak},
        time::Duration,
    },
};

struct Recorder {
    applied: RefCell<Vec<Option<WlBufferId>>>,
    listener: EventListener<dyn SurfaceCommitListener>,
}

impl Recorder {
    fn install(surface: &WlSurface) -> Rc<Self> {
        let slf = Rc::new_cyclic(|slf: &Weak<Self>| Self {
            applied: Default::default(),
            listener: EventListener::new(slf.clone()),
        });
        slf.listener.attach(&surface.commit_event);
        slf
    }

    fn take(&self) -> Vec<Option<WlBufferId>> {
        self.applied.take()
    }
}

impl SurfaceCommitListener for Recorder {
    fn after_commit(self: Rc<Self>, surface: &Rc<WlSurface>) {
        self.applied
            .borrow_mut()
            .push(surface.buffer().map(|b| b.id));
    }
}

struct DestroyCounter {
    count: NumCell<u32>,
    listener: EventListener<dyn FifoDestroyListener>,
}

impl DestroyCounter {
    fn install(fifo: &WpFifoV1) -> Rc<Self> {
        let slf = Rc::new_cyclic(|slf: &Weak<Self>| Self {
            count: NumCell::new(0),
            listener: EventListener::new(slf.clone()),
        });
        slf.listener.attach(&fifo.destroy_event);
        slf
    }
}

impl FifoDestroyListener for DestroyCounter {
    fn fifo_destroyed(self: Rc<Self>, _fifo: &WpFifoV1) {
        self.count.fetch_add(1);
    }
}

struct Setup {
    run: Rc<TestRun>,
    client: Rc<TestClient>,
    surface: Rc<TestSurface>,
    fifo: Rc<WpFifoV1>,
}

/// A surface with content and a fifo object that is not bound to an output.
fn setup() -> Setup {
    setup_with_config(Config::default())
}

fn setup_with_config(config: Config) -> Setup {
    let run = TestRun::with_config(config);
    let client = run.create_client();
    let surface = client.create_surface();
    let fifo = surface.get_fifo().unwrap();
    surface.frame(false, false);
    Setup {
        run,
        client,
        surface,
        fifo,
    }
}

fn ids(buffers: &[&Rc<crate::ifs::wl_buffer::WlBuffer>]) -> Vec<Option<WlBufferId>> {
    buffers.iter().map(|b| Some(b.id)).collect()
}

#[test]
fn commits_apply_immediately_while_disarmed() {
    let s = setup();
    for _ in 0..5 {
        let buffer = s.surface.frame(false, true);
        assert_eq!(s.surface.current_buffer(), Some(buffer.id));
        assert_eq!(s.fifo.num_queued(), 0);
        assert!(!s.fifo.is_armed());
    }
    assert_eq!(s.surface.surface.num_cached(), 0);
}

#[test]
fn scenario_a_wait_before_arm_applies() {
    let s = setup();
    let b1 = s.surface.frame(false, true);
    assert_eq!(s.surface.current_buffer(), Some(b1.id));
    assert!(!s.fifo.is_armed());
    let b2 = s.surface.frame(true, false);
    assert_eq!(s.surface.current_buffer(), Some(b2.id));
    assert!(s.fifo.is_armed());
    let _b3 = s.surface.frame(false, true);
    assert_eq!(s.surface.current_buffer(), Some(b2.id));
    assert_eq!(s.fifo.num_queued(), 1);
    assert_eq!(s.surface.surface.num_cached(), 1);
}

#[test]
fn barrier_stays_armed_until_release() {
    let s = setup();
    let armer = s.surface.frame(true, false);
    for i in 1..=5 {
        s.surface.frame(false, true);
        assert!(s.fifo.is_armed());
        assert_eq!(s.fifo.num_queued(), i);
    }
    assert_eq!(s.surface.current_buffer(), Some(armer.id));
}

#[test]
fn release_applies_in_submission_order() {
    let s = setup();
    let output = s.run.add_output("TEST-1", 60);
    s.surface.surface.enter_output(&output);
    s.surface.frame(true, false);
    let recorder = Recorder::install(&s.surface.surface);
    let b3 = s.surface.frame(false, true);
    let b4 = s.surface.frame(false, true);
    let b5 = s.surface.frame(false, true);
    assert!(recorder.take().is_empty());
    output.refresh_complete();
    assert_eq!(recorder.take(), ids(&[&b3, &b4, &b5]));
    assert_eq!(s.fifo.num_queued(), 0);
    assert!(!s.fifo.is_armed());
    assert_eq!(s.surface.surface.num_cached(), 0);
}

#[test]
fn release_stops_after_reissued_barrier() {
    let s = setup();
    let output = s.run.add_output("TEST-1", 60);
    s.surface.surface.enter_output(&output);
    s.surface.frame(true, false);
    let recorder = Recorder::install(&s.surface.surface);
    let b3 = s.surface.frame(false, true);
    let b4 = s.surface.frame(true, true);
    let b5 = s.surface.frame(false, true);
    assert_eq!(s.fifo.num_queued(), 3);

    output.refresh_complete();
    assert_eq!(recorder.take(), ids(&[&b3, &b4]));
    assert!(s.fifo.is_armed());
    assert_eq!(s.fifo.num_queued(), 1);
    assert_eq!(s.fifo.current(), FifoState {
        set_barrier: true,
        wait_barrier: true,
    });

    output.refresh_complete();
    assert_eq!(recorder.take(), ids(&[&b5]));
    assert!(!s.fifo.is_armed());
    assert_eq!(s.fifo.num_queued(), 0);
}

#[test]
fn losing_the_output_resets() {
    let s = setup();
    let output = s.run.add_output("TEST-1", 60);
    s.surface.surface.enter_output(&output);
    assert_eq!(s.fifo.output().map(|o| o.id), Some(output.id));
    s.surface.frame(true, false);
    let recorder = Recorder::install(&s.surface.surface);
    let b3 = s.surface.frame(false, true);
    let b4 = s.surface.frame(false, true);

    s.surface.surface.leave_output(&output);
    assert_eq!(recorder.take(), ids(&[&b3, &b4]));
    assert!(s.fifo.output().is_none());
    assert!(!s.fifo.is_armed());
    assert_eq!(s.fifo.num_queued(), 0);
    assert_eq!(s.fifo.current(), FifoState::default());
    assert!(s.fifo.last_refresh().is_none());
    assert!(!output.refresh_event.has_listeners());
    assert!(!output.destroy_event.has_listeners());

    s.surface.surface.leave_output(&output);
    s.fifo.set_output(None);
    s.fifo.set_output(None);
    assert!(recorder.take().is_empty());
    assert!(!s.fifo.is_armed());
    assert_eq!(s.fifo.num_queued(), 0);
}

#[test]
fn output_destruction_resets() {
    let s = setup();
    let output = s.run.add_output("TEST-1", 60);
    s.surface.surface.enter_output(&output);
    s.surface.frame(true, false);
    let b3 = s.surface.frame(false, true);
    s.run.state.remove_output(output.id);
    assert_eq!(s.surface.current_buffer(), Some(b3.id));
    assert!(s.fifo.output().is_none());
    assert!(s.surface.surface.primary_output().is_none());
    assert!(!s.fifo.is_armed());
    assert_eq!(s.fifo.num_queued(), 0);
}

#[test]
fn primary_output_change_rebinds() {
    let s = setup();
    let a = s.run.add_output("TEST-A", 60);
    let b = s.run.add_output("TEST-B", 120);
    s.surface.surface.enter_output(&a);
    s.surface.surface.enter_output(&b);
    assert_eq!(s.fifo.output().map(|o| o.id), Some(a.id));
    s.surface.frame(true, false);
    s.surface.frame(false, true);
    assert_eq!(s.fifo.num_queued(), 1);

    s.surface.surface.leave_output(&a);
    assert_eq!(s.fifo.output().map(|o| o.id), Some(b.id));
    assert_eq!(s.fifo.num_queued(), 0);
    assert_eq!(s.fifo.cadence(), Duration::from_nanos(8_333_333));
    assert!(!a.refresh_event.has_listeners());
    assert!(b.refresh_event.has_listeners());
}

#[test]
fn scenario_b_timer_releases_occluded_surface() {
    let s = setup();
    s.surface.frame(true, false);
    s.surface.frame(false, true);
    let last = s.surface.frame(false, true);
    s.run.advance(Duration::from_millis(20));
    assert_eq!(s.fifo.num_queued(), 2);
    assert!(s.fifo.is_armed());
    s.run.advance(Duration::from_millis(10));
    assert_eq!(s.fifo.num_queued(), 0);
    assert!(!s.fifo.is_armed());
    assert_eq!(s.surface.current_buffer(), Some(last.id));
}

#[test]
fn timer_cadence_follows_refresh_rate() {
    let s = setup();
    assert_eq!(s.fifo.cadence(), Duration::from_millis(25));
    let output = s.run.add_output("TEST-1", 50);
    s.surface.surface.enter_output(&output);
    assert_eq!(s.fifo.cadence(), Duration::from_millis(20));
    output.set_refresh_rate_millihz(0);
    assert_eq!(s.fifo.cadence(), Duration::from_millis(25));
}

#[test]
fn fallback_interval_is_configurable() {
    let mut config = Config::default();
    config.fifo.fallback_interval_ms = 10;
    let s = setup_with_config(config);
    assert_eq!(s.fifo.cadence(), Duration::from_millis(10));
    s.surface.frame(true, false);
    s.surface.frame(false, true);
    s.run.advance(Duration::from_millis(11));
    assert_eq!(s.fifo.num_queued(), 0);
}

#[test]
fn recent_refresh_prevents_timer_release() {
    let run = TestRun::new();
    let client = run.create_client();
    let surface = client.create_surface();
    let output = run.add_output("TEST-1", 60);
    surface.surface.enter_output(&output);
    let fifo = surface.get_fifo().unwrap();
    surface.frame(false, false);
    output.refresh_complete();
    assert_eq!(fifo.last_refresh(), Some(run.state.now()));

    surface.frame(true, false);
    surface.frame(false, true);
    run.advance(Duration::from_millis(17));
    assert_eq!(fifo.num_queued(), 1);
    assert!(fifo.is_armed());
    run.advance(Duration::from_millis(17));
    assert_eq!(fifo.num_queued(), 0);
    assert!(!fifo.is_armed());
}

#[test]
fn timer_is_always_rescheduled() {
    let s = setup();
    for _ in 0..4 {
        s.run.advance(Duration::from_millis(25));
        assert_eq!(s.run.wheel.num_armed(), 1);
    }
}

#[test]
fn refresh_is_ignored_without_buffer() {
    let run = TestRun::new();
    let client = run.create_client();
    let surface = client.create_surface();
    let output = run.add_output("TEST-1", 60);
    surface.surface.enter_output(&output);
    let fifo = surface.get_fifo().unwrap();
    surface.set_barrier(&fifo).unwrap();
    surface.commit();
    assert!(fifo.is_armed());
    output.refresh_complete();
    assert!(fifo.is_armed());
    assert!(fifo.last_refresh().is_none());
}

#[test]
fn commits_without_content_are_not_queued() {
    let run = TestRun::new();
    let client = run.create_client();
    let surface = client.create_surface();
    let fifo = surface.get_fifo().unwrap();

    // no buffer yet
    let b1 = surface.frame(true, true);
    assert_eq!(surface.current_buffer(), Some(b1.id));
    assert!(fifo.is_armed());

    // detaching
    surface.attach(None);
    surface.wait_barrier(&fifo).unwrap();
    surface.commit();
    assert_eq!(fifo.num_queued(), 0);
    assert_eq!(surface.current_buffer(), None);
    assert!(b1.released.get());
}

#[test]
fn scenario_c_second_fifo_fails() {
    let s = setup();
    assert!(s.surface.get_fifo().is_err());
    let errors = s.client.errors();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        PostedError::Protocol {
            interface, code, ..
        } => {
            assert_eq!(*interface, wire::WpFifoManagerV1);
            assert_eq!(*code, ALREADY_EXISTS);
        }
        e => panic!("unexpected error {:?}", e),
    }
    let fifo = s.surface.fifo();
    assert!(Rc::ptr_eq(&fifo, &s.fifo));
    assert!(!fifo.is_destroyed());

    s.surface.frame(true, false);
    s.surface.frame(false, true);
    assert_eq!(s.fifo.num_queued(), 1);
    s.run.advance(Duration::from_millis(30));
    assert_eq!(s.fifo.num_queued(), 0);
}

#[test]
fn scenario_d_destroy_unlocks_queue() {
    let s = setup();
    let output = s.run.add_output("TEST-1", 60);
    s.surface.surface.enter_output(&output);
    s.surface.frame(true, false);
    let counter = DestroyCounter::install(&s.fifo);
    let recorder = Recorder::install(&s.surface.surface);
    let b3 = s.surface.frame(false, true);
    let b4 = s.surface.frame(false, true);
    assert_eq!(s.fifo.num_queued(), 2);

    s.surface.destroy_fifo(&s.fifo).unwrap();
    assert_eq!(recorder.take(), ids(&[&b3, &b4]));
    assert_eq!(counter.count.get(), 1);
    assert!(s.fifo.is_destroyed());
    assert!(s.surface.surface.fifo.is_none());
    assert_eq!(s.surface.surface.num_cached(), 0);
    assert_eq!(s.run.wheel.num_armed(), 0);
    assert!(!output.refresh_event.has_listeners());
    assert!(!s.surface.surface.client_commit_event.has_listeners());

    output.refresh_complete();
    s.run.advance(Duration::from_millis(100));
    assert_eq!(counter.count.get(), 1);

    // the surface keeps working without pacing
    let b5 = s.surface.frame_without_fifo();
    assert_eq!(recorder.take(), ids(&[&b5]));

    // a new fifo can be created for the surface
    let fifo = s.surface.get_fifo().unwrap();
    assert!(!Rc::ptr_eq(&fifo, &s.fifo));
}

#[test]
fn surface_destruction_destroys_fifo() {
    let s = setup();
    s.surface.frame(true, false);
    let counter = DestroyCounter::install(&s.fifo);
    let recorder = Recorder::install(&s.surface.surface);
    s.surface.frame(false, true);
    s.surface.frame(false, true);

    s.surface.destroy();
    assert!(s.fifo.is_destroyed());
    assert_eq!(counter.count.get(), 1);
    assert!(recorder.take().is_empty());
    assert_eq!(s.surface.surface.num_cached(), 0);
    assert_eq!(s.run.wheel.num_armed(), 0);

    s.surface.destroy_fifo(&s.fifo).unwrap();
    assert_eq!(counter.count.get(), 1);
}

#[test]
fn client_disconnect_destroys_fifo() {
    let s = setup();
    let counter = DestroyCounter::install(&s.fifo);
    s.surface.frame(true, false);
    s.surface.frame(false, true);
    s.client.disconnect();
    assert!(s.fifo.is_destroyed());
    assert_eq!(counter.count.get(), 1);
    assert_eq!(s.run.wheel.num_armed(), 0);
    assert_eq!(s.run.state.clients.len(), 0);
}

#[test]
fn queue_limit_posts_no_memory() {
    let mut config = Config::default();
    config.fifo.max_queued_commits = 2;
    let s = setup_with_config(config);
    s.surface.frame(true, false);
    let recorder = Recorder::install(&s.surface.surface);
    let b3 = s.surface.frame(false, true);
    let b4 = s.surface.frame(false, true);
    assert!(s.client.errors().is_empty());

    let b5 = s.surface.frame(false, true);
    assert_eq!(s.client.errors(), vec![PostedError::NoMemory]);
    assert_eq!(s.fifo.num_queued(), 2);
    assert!(s.fifo.is_armed());
    // applies as soon as the commits before it have been released
    assert_eq!(s.surface.surface.num_cached(), 3);
    assert!(recorder.take().is_empty());

    s.run.advance(Duration::from_millis(30));
    assert_eq!(recorder.take(), ids(&[&b3, &b4, &b5]));
    assert_eq!(s.surface.surface.num_cached(), 0);
}

#[test]
fn pending_requests_are_double_buffered() {
    let s = setup();
    s.surface.set_barrier(&s.fifo).unwrap();
    assert_eq!(s.fifo.pending(), FifoState {
        set_barrier: true,
        wait_barrier: false,
    });
    assert_eq!(s.fifo.current(), FifoState::default());
    s.surface.commit();
    assert_eq!(s.fifo.pending(), FifoState::default());
    assert!(s.fifo.current().set_barrier);
    assert!(s.fifo.is_armed());
}
