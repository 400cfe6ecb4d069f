use {
    crate::{
        client::{Client, PostedError},
        config::Config,
        ifs::{
            wl_buffer::WlBuffer,
            wl_surface::{
                WlSurface,
                wp_fifo_v1::{WpFifoV1, WpFifoV1Error},
            },
            wp_fifo_manager_v1::{WpFifoManagerV1, WpFifoManagerV1Error, WpFifoManagerV1Global},
        },
        object::{ObjectId, Version},
        state::State,
        time::{Clock, ManualClock},
        tree::OutputNode,
        utils::numcell::NumCell,
        wheel::Wheel,
        wire::{
            WlBufferId, WlSurfaceId, WpFifoManagerV1Id, WpFifoV1Id,
            wl_surface::{self, WlSurfaceRequestHandler},
            wp_fifo_manager_v1::{self, WpFifoManagerV1RequestHandler},
            wp_fifo_v1::{self, WpFifoV1RequestHandler},
        },
    },
    log::LevelFilter,
    std::{rc::Rc, time::Duration},
};

pub struct TestRun {
    pub clock: Rc<ManualClock>,
    pub wheel: Rc<Wheel>,
    pub state: Rc<State>,
    pub manager: Rc<WpFifoManagerV1Global>,
}

impl TestRun {
    pub fn new() -> Rc<Self> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Rc<Self> {
        let _ = simplelog::TestLogger::init(LevelFilter::Trace, simplelog::Config::default());
        let clock = Rc::new(ManualClock::default());
        let dyn_clock: Rc<dyn Clock> = clock.clone();
        let wheel = Wheel::new(&dyn_clock);
        let version = config.fifo.version;
        let state = State::new(&dyn_clock, &wheel, config);
        let manager = WpFifoManagerV1Global::create(&state, version).unwrap();
        Rc::new(Self {
            clock,
            wheel,
            state,
            manager,
        })
    }

    /// Advances the clock by `d`, dispatching every timer that expires on the way.
    pub fn advance(&self, d: Duration) {
        let end = self.clock.now() + d;
        while let Some(next) = self.wheel.next_expiration() {
            if next > end {
                break;
            }
            self.clock.set(next);
            self.wheel.dispatch_expired().unwrap();
        }
        self.clock.set(end);
    }

    pub fn add_output(&self, name: &str, refresh_rate_hz: u32) -> Rc<OutputNode> {
        self.state.add_output(name, refresh_rate_hz * 1000)
    }

    pub fn create_client(self: &Rc<Self>) -> Rc<TestClient> {
        let client = self.state.clients.spawn(&self.state);
        let tc = Rc::new(TestClient {
            run: self.clone(),
            client,
            next_id: NumCell::new(1),
        });
        let id: WpFifoManagerV1Id = tc.id();
        self.state
            .globals
            .bind(&tc.client, self.manager.name, id.into(), Version(1))
            .unwrap();
        tc
    }
}

pub struct TestClient {
    pub run: Rc<TestRun>,
    pub client: Rc<Client>,
    next_id: NumCell<u32>,
}

impl TestClient {
    pub fn id<T: From<ObjectId>>(&self) -> T {
        ObjectId::from_raw(self.next_id.fetch_add(1)).into()
    }

    pub fn manager(&self) -> Rc<WpFifoManagerV1> {
        self.client.lookup(WpFifoManagerV1Id::from_raw(1)).unwrap()
    }

    pub fn create_surface(self: &Rc<Self>) -> Rc<TestSurface> {
        let id: WlSurfaceId = self.id();
        let surface = WlSurface::new(id, &self.client, Version(6));
        self.client.add_client_obj(&surface).unwrap();
        Rc::new(TestSurface {
            client: self.clone(),
            surface,
        })
    }

    pub fn create_buffer(&self) -> Rc<WlBuffer> {
        let id: WlBufferId = self.id();
        let buffer = Rc::new(WlBuffer::new(id, &self.client));
        self.client.add_client_obj(&buffer).unwrap();
        buffer
    }

    pub fn errors(&self) -> Vec<PostedError> {
        self.client.posted_errors()
    }

    pub fn disconnect(&self) {
        self.run.state.clients.kill(self.client.id);
    }
}

pub struct TestSurface {
    pub client: Rc<TestClient>,
    pub surface: Rc<WlSurface>,
}

impl TestSurface {
    pub fn get_fifo(&self) -> Result<Rc<WpFifoV1>, WpFifoManagerV1Error> {
        let manager = self.client.manager();
        let id: WpFifoV1Id = self.client.id();
        manager.get_fifo(
            wp_fifo_manager_v1::GetFifo {
                self_id: manager.id,
                id,
                surface: self.surface.id,
            },
            &manager,
        )?;
        Ok(self.client.client.lookup(id)?)
    }

    pub fn fifo(&self) -> Rc<WpFifoV1> {
        self.surface.fifo.get().unwrap()
    }

    pub fn attach(&self, buffer: Option<&Rc<WlBuffer>>) {
        let buffer = buffer.map(|b| b.id).unwrap_or(WlBufferId::NONE);
        self.surface
            .attach(
                wl_surface::Attach {
                    self_id: self.surface.id,
                    buffer,
                },
                &self.surface,
            )
            .unwrap();
    }

    pub fn commit(&self) {
        self.surface
            .commit(
                wl_surface::Commit {
                    self_id: self.surface.id,
                },
                &self.surface,
            )
            .unwrap();
    }

    /// Attaches a new buffer, makes the requested fifo requests and commits.
    pub fn frame(&self, set_barrier: bool, wait_barrier: bool) -> Rc<WlBuffer> {
        let buffer = self.client.create_buffer();
        self.attach(Some(&buffer));
        let fifo = self.fifo();
        if set_barrier {
            self.set_barrier(&fifo).unwrap();
        }
        if wait_barrier {
            self.wait_barrier(&fifo).unwrap();
        }
        self.commit();
        buffer
    }

    pub fn frame_without_fifo(&self) -> Rc<WlBuffer> {
        let buffer = self.client.create_buffer();
        self.attach(Some(&buffer));
        self.commit();
        buffer
    }

    pub fn set_barrier(&self, fifo: &Rc<WpFifoV1>) -> Result<(), WpFifoV1Error> {
        fifo.set_barrier(wp_fifo_v1::SetBarrier { self_id: fifo.id }, fifo)
    }

    pub fn wait_barrier(&self, fifo: &Rc<WpFifoV1>) -> Result<(), WpFifoV1Error> {
        fifo.wait_barrier(wp_fifo_v1::WaitBarrier { self_id: fifo.id }, fifo)
    }

    pub fn destroy_fifo(&self, fifo: &Rc<WpFifoV1>) -> Result<(), WpFifoV1Error> {
        WpFifoV1RequestHandler::destroy(&**fifo, wp_fifo_v1::Destroy { self_id: fifo.id }, fifo)
    }

    pub fn destroy(&self) {
        WlSurfaceRequestHandler::destroy(
            &*self.surface,
            wl_surface::Destroy {
                self_id: self.surface.id,
            },
            &self.surface,
        )
        .unwrap();
    }

    pub fn current_buffer(&self) -> Option<WlBufferId> {
        self.surface.buffer().map(|b| b.id)
    }
}
