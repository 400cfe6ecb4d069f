//! Request messages of the protocols implemented by this crate.
//!
//! Messages are delivered as typed values after the transport has decoded them.

#![allow(non_upper_case_globals)]

use crate::object::Interface;

id!(WlSurfaceId);
id!(WlBufferId);
id!(WpFifoManagerV1Id);
id!(WpFifoV1Id);

pub const WlSurface: Interface = Interface("wl_surface");
pub const WlBuffer: Interface = Interface("wl_buffer");
pub const WpFifoManagerV1: Interface = Interface("wp_fifo_manager_v1");
pub const WpFifoV1: Interface = Interface("wp_fifo_v1");

pub mod wl_surface {
    use {
        super::{WlBufferId, WlSurfaceId},
        std::rc::Rc,
    };

    #[derive(Debug)]
    pub struct Attach {
        pub self_id: WlSurfaceId,
        pub buffer: WlBufferId,
    }

    #[derive(Debug)]
    pub struct Commit {
        pub self_id: WlSurfaceId,
    }

    #[derive(Debug)]
    pub struct Destroy {
        pub self_id: WlSurfaceId,
    }

    pub trait WlSurfaceRequestHandler {
        type Error;

        fn attach(&self, req: Attach, slf: &Rc<Self>) -> Result<(), Self::Error>;
        fn commit(&self, req: Commit, slf: &Rc<Self>) -> Result<(), Self::Error>;
        fn destroy(&self, req: Destroy, slf: &Rc<Self>) -> Result<(), Self::Error>;
    }
}

pub mod wp_fifo_manager_v1 {
    use {
        super::{WlSurfaceId, WpFifoManagerV1Id, WpFifoV1Id},
        std::rc::Rc,
    };

    pub const ALREADY_EXISTS: u32 = 0;

    #[derive(Debug)]
    pub struct Destroy {
        pub self_id: WpFifoManagerV1Id,
    }

    #[derive(Debug)]
    pub struct GetFifo {
        pub self_id: WpFifoManagerV1Id,
        pub id: WpFifoV1Id,
        pub surface: WlSurfaceId,
    }

    pub trait WpFifoManagerV1RequestHandler {
        type Error;

        fn destroy(&self, req: Destroy, slf: &Rc<Self>) -> Result<(), Self::Error>;
        fn get_fifo(&self, req: GetFifo, slf: &Rc<Self>) -> Result<(), Self::Error>;
    }
}

pub mod wp_fifo_v1 {
    use {super::WpFifoV1Id, std::rc::Rc};

    #[derive(Debug)]
    pub struct SetBarrier {
        pub self_id: WpFifoV1Id,
    }

    #[derive(Debug)]
    pub struct WaitBarrier {
        pub self_id: WpFifoV1Id,
    }

    #[derive(Debug)]
    pub struct Destroy {
        pub self_id: WpFifoV1Id,
    }

    pub trait WpFifoV1RequestHandler {
        type Error;

        fn set_barrier(&self, req: SetBarrier, slf: &Rc<Self>) -> Result<(), Self::Error>;
        fn wait_barrier(&self, req: WaitBarrier, slf: &Rc<Self>) -> Result<(), Self::Error>;
        fn destroy(&self, req: Destroy, slf: &Rc<Self>) -> Result<(), Self::Error>;
    }
}
