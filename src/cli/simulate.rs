use {
    crate::{
        cli::SimulateArgs,
        client::{Client, ClientError},
        config::Config,
        event_loop::{EventLoop, EventLoopError, EventLoopRef},
        globals::GlobalsError,
        ifs::{
            wl_buffer::WlBuffer,
            wl_surface::{
                SurfaceCommitListener, WlSurface, WlSurfaceError,
                wp_fifo_v1::{WpFifoV1, WpFifoV1Error},
            },
            wp_fifo_manager_v1::{WpFifoManagerV1Error, WpFifoManagerV1Global},
        },
        object::{ObjectId, Version},
        state::State,
        time::{Clock, ManualClock, MonotonicClock, Time},
        tree::OutputNode,
        utils::{errorfmt::ErrorFmt, event_listener::EventListener, numcell::NumCell},
        wheel::{Wheel, WheelDispatcher, WheelError, WheelTimer},
        wire::{
            WlBufferId, WlSurfaceId, WpFifoManagerV1Id, WpFifoV1Id, wl_surface, wp_fifo_manager_v1,
            wp_fifo_v1,
        },
    },
    std::{
        cell::Cell,
        rc::{Rc, Weak},
        time::Duration,
    },
    thiserror::Error,
};


const NUM_BUFFERS: u32 = 3;

#[derive(Debug, Error)]
enum SimulateError {
    #[error("Invalid rate {0}")]
    InvalidRate(f64),
    #[error(transparent)]
    EventLoopError(#[from] EventLoopError),
    #[error(transparent)]
    WheelError(#[from] WheelError),
    #[error(transparent)]
    GlobalsError(#[from] GlobalsError),
    #[error(transparent)]
    ClientError(#[from] ClientError),
    #[error(transparent)]
    WlSurfaceError(#[from] WlSurfaceError),
    #[error(transparent)]
    WpFifoV1Error(#[from] WpFifoV1Error),
    #[error(transparent)]
    WpFifoManagerV1Error(#[from] WpFifoManagerV1Error),
    #[error("The client was disconnected")]
    Disconnected,
}

pub fn main(args: SimulateArgs) {
    if let Err(e) = run(args) {
        fatal!("The simulation failed: {}", ErrorFmt(e));
    }
}

#[derive(Copy, Clone, Debug)]
struct Summary {
    frames_committed: u64,
    frames_queued: u64,
    frames_applied: u64,
    refreshes: u64,
    elapsed: Duration,
}

fn interval(rate: f64) -> Result<Duration, SimulateError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(SimulateError::InvalidRate(rate));
    }
    Ok(Duration::from_secs_f64(1.0 / rate))
}

fn run(args: SimulateArgs) -> Result<Summary, SimulateError> {
    let config = Config::load_or_default(args.config.as_deref());
    let refresh_rate = args.refresh_rate.unwrap_or(config.simulate.refresh_rate);
    let client_rate = args.client_rate.unwrap_or(config.simulate.client_rate);
    let params = Params {
        refresh_rate,
        refresh_interval: interval(refresh_rate)?,
        client_interval: interval(client_rate)?,
        occluded_after: args.occluded_after,
    };
    log::info!(
        "Simulating {:?} with an output at {} Hz and a client at {} Hz",
        args.duration,
        refresh_rate,
        client_rate,
    );
    let summary = if args.virtual_time {
        let manual = Rc::new(ManualClock::default());
        let clock: Rc<dyn Clock> = manual.clone();
        let wheel = Wheel::new(&clock);
        let sim = Simulation::create(&clock, &wheel, config, params)?;
        let end = manual.now() + args.duration;
        while let Some(next) = wheel.next_expiration() {
            if next > end {
                break;
            }
            manual.set(next);
            wheel.dispatch_expired()?;
        }
        manual.set(end);
        sim.finish()
    } else {
        let el = EventLoop::new()?;
        let clock: Rc<dyn Clock> = Rc::new(MonotonicClock);
        let wheel = Wheel::install(&el.to_ref(), &clock)?;
        let sim = Simulation::create(&clock, &wheel, config, params)?;
        let stop: Rc<dyn WheelDispatcher> = Rc::new(Stop { el: el.to_ref() });
        let stop_timer = wheel.timer(Rc::downgrade(&stop));
        stop_timer.program(args.duration)?;
        el.run()?;
        sim.finish()
    };
    Ok(summary)
}

struct Stop {
    el: EventLoopRef,
}

impl WheelDispatcher for Stop {
    fn expired(self: Rc<Self>) {
        self.el.stop();
    }
}

#[derive(Copy, Clone)]
struct Params {
    refresh_rate: f64,
    refresh_interval: Duration,
    client_interval: Duration,
    occluded_after: Option<Duration>,
}

struct Simulation {
    state: Rc<State>,
    params: Params,
    start: Time,
    output: Rc<OutputNode>,
    client: Rc<Client>,
    surface: Rc<WlSurface>,
    fifo: Rc<WpFifoV1>,
    buffers: Vec<Rc<WlBuffer>>,
    timer: WheelTimer,
    commit_listener: EventListener<dyn SurfaceCommitListener>,
    next_refresh: Cell<Time>,
    next_frame: Cell<Time>,
    occluded: Cell<bool>,
    frames_committed: NumCell<u64>,
    frames_queued: NumCell<u64>,
    refreshes: NumCell<u64>,
}

impl Simulation {
    fn create(
        clock: &Rc<dyn Clock>,
        wheel: &Rc<Wheel>,
        config: Config,
        params: Params,
    ) -> Result<Rc<Self>, SimulateError> {
        let version = config.fifo.version;
        let state = State::new(clock, wheel, config);
        let manager = WpFifoManagerV1Global::create(&state, version)?;
        let output = state.add_output("SIM-1", (params.refresh_rate * 1000.0).round() as u32);
        let client = state.clients.spawn(&state);
        let ids = NumCell::new(1u32);
        let next_id = || ObjectId::from_raw(ids.fetch_add(1));

        let manager_id = WpFifoManagerV1Id::from(next_id());
        state
            .globals
            .bind(&client, manager.name, manager_id.into(), Version(1))?;
        let surface = WlSurface::new(WlSurfaceId::from(next_id()), &client, Version(6));
        client.add_client_obj(&surface)?;
        surface.enter_output(&output);
        let mut buffers = vec![];
        for _ in 0..NUM_BUFFERS {
            let buffer = Rc::new(WlBuffer::new(WlBufferId::from(next_id()), &client));
            client.add_client_obj(&buffer)?;
            buffers.push(buffer);
        }
        let manager_obj = client.lookup(manager_id)?;
        let fifo_id = WpFifoV1Id::from(next_id());
        wp_fifo_manager_v1::WpFifoManagerV1RequestHandler::get_fifo(
            &*manager_obj,
            wp_fifo_manager_v1::GetFifo {
                self_id: manager_id,
                id: fifo_id,
                surface: surface.id,
            },
            &manager_obj,
        )?;
        if client.is_shutting_down() {
            return Err(SimulateError::Disconnected);
        }
        let fifo = client.lookup(fifo_id)?;
        let start = state.now();
        let sim = Rc::new_cyclic(|slf: &Weak<Self>| Self {
            timer: wheel.timer(slf.clone()),
            commit_listener: EventListener::new(slf.clone()),
            state,
            params,
            start,
            output,
            client,
            surface,
            fifo,
            buffers,
            next_refresh: Cell::new(start + params.refresh_interval),
            next_frame: Cell::new(start),
            occluded: Cell::new(false),
            frames_committed: NumCell::new(0),
            frames_queued: NumCell::new(0),
            refreshes: NumCell::new(0),
        });
        sim.commit_listener.attach(&sim.surface.commit_event);
        sim.schedule();
        Ok(sim)
    }

    fn schedule(&self) {
        let next = self.next_refresh.get().min(self.next_frame.get());
        if let Err(e) = self.timer.program(next - self.state.now()) {
            log::error!("Could not program the simulation timer: {}", ErrorFmt(e));
        }
    }

    fn refresh(&self, now: Time) {
        if let Some(after) = self.params.occluded_after
            && now - self.start >= after
        {
            if !self.occluded.replace(true) {
                log::info!("Output {} is now occluded", self.output.name);
            }
            return;
        }
        self.refreshes.fetch_add(1);
        self.output.refresh_complete();
    }

    fn commit_frame(&self) -> Result<(), SimulateError> {
        let frame = self.frames_committed.fetch_add(1);
        let buffer = &self.buffers[(frame % NUM_BUFFERS as u64) as usize];
        let fifo_id = self.fifo.id;
        wl_surface::WlSurfaceRequestHandler::attach(
            &*self.surface,
            wl_surface::Attach {
                self_id: self.surface.id,
                buffer: buffer.id,
            },
            &self.surface,
        )?;
        wp_fifo_v1::WpFifoV1RequestHandler::set_barrier(
            &*self.fifo,
            wp_fifo_v1::SetBarrier { self_id: fifo_id },
            &self.fifo,
        )?;
        wp_fifo_v1::WpFifoV1RequestHandler::wait_barrier(
            &*self.fifo,
            wp_fifo_v1::WaitBarrier { self_id: fifo_id },
            &self.fifo,
        )?;
        let queued = self.fifo.num_queued();
        wl_surface::WlSurfaceRequestHandler::commit(
            &*self.surface,
            wl_surface::Commit {
                self_id: self.surface.id,
            },
            &self.surface,
        )?;
        if self.fifo.num_queued() > queued {
            self.frames_queued.fetch_add(1);
            log::debug!(
                "Frame {} queued ({} waiting)",
                frame,
                self.fifo.num_queued()
            );
        }
        if self.client.is_shutting_down() {
            return Err(SimulateError::Disconnected);
        }
        Ok(())
    }

    fn finish(&self) -> Summary {
        let summary = Summary {
            frames_committed: self.frames_committed.get(),
            frames_queued: self.frames_queued.get(),
            frames_applied: self.surface.commits_applied(),
            refreshes: self.refreshes.get(),
            elapsed: self.state.now() - self.start,
        };
        let secs = summary.elapsed.as_secs_f64().max(f64::EPSILON);
        log::info!(
            "{} frames committed, {} queued, {} applied, {} refreshes in {:?}",
            summary.frames_committed,
            summary.frames_queued,
            summary.frames_applied,
            summary.refreshes,
            summary.elapsed,
        );
        log::info!(
            "Effective frame rate: {:.1} Hz",
            summary.frames_applied as f64 / secs
        );
        self.timer.cancel();
        self.commit_listener.detach();
        self.state.destroy_display();
        summary
    }
}

impl WheelDispatcher for Simulation {
    fn expired(self: Rc<Self>) {
        let now = self.state.now();
        if now >= self.next_refresh.get() {
            self.refresh(now);
            self.next_refresh
                .set(self.next_refresh.get() + self.params.refresh_interval);
        }
        if now >= self.next_frame.get() {
            if let Err(e) = self.commit_frame() {
                self.client.error(e);
                return;
            }
            self.next_frame
                .set(self.next_frame.get() + self.params.client_interval);
        }
        self.schedule();
    }
}

impl SurfaceCommitListener for Simulation {
    fn after_commit(self: Rc<Self>, surface: &Rc<WlSurface>) {
        if let Some(buffer) = surface.buffer() {
            log::debug!(
                "Commit {} applied with buffer {}",
                surface.commits_applied(),
                buffer.id,
            );
        }
    }
}
