pub mod wl_buffer;
pub mod wl_surface;
pub mod wp_fifo_manager_v1;
