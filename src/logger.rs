use {
    crate::utils::{errorfmt::ErrorFmt, oserror::OsError},
    backtrace::Backtrace,
    log::{Level, Log, Metadata, Record},
    std::{
        cell::RefCell,
        io::Write,
        sync::{
            Arc,
            atomic::{AtomicU32, Ordering::Relaxed},
        },
        time::SystemTime,
    },
    uapi::{Fd, OwnedFd},
};

thread_local! {
    static BUFFER: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

pub struct Logger {
    level: AtomicU32,
    file: OwnedFd,
}

impl Logger {
    pub fn install_stderr(level: Level) -> Arc<Self> {
        let file = match uapi::fcntl_dupfd_cloexec(2, 0) {
            Ok(fd) => fd,
            Err(e) => {
                let e = OsError::from(e);
                fatal!("Error: Could not dup stderr: {}", ErrorFmt(e));
            }
        };
        std::panic::set_hook(Box::new(|p| {
            if let Some(loc) = p.location() {
                log::error!(
                    "Panic at {} line {} column {}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                );
            } else {
                log::error!("Panic at unknown location");
            }
            if let Some(msg) = p.payload().downcast_ref::<&str>() {
                log::error!("Message: {}", msg);
            }
            if let Some(msg) = p.payload().downcast_ref::<String>() {
                log::error!("Message: {}", msg);
            }
            log::error!("Backtrace:\n{:?}", Backtrace::new());
        }));
        let slf = Arc::new(Self {
            level: AtomicU32::new(level as _),
            file,
        });
        let res = log::set_boxed_logger(Box::new(LogWrapper {
            logger: slf.clone(),
        }));
        if res.is_err() {
            eprintln!("Error: A logger has already been installed");
        }
        log::set_max_level(level.to_level_filter());
        slf
    }

    pub fn set_level(&self, level: Level) {
        self.level.store(level as _, Relaxed);
        log::set_max_level(level.to_level_filter());
    }
}

struct LogWrapper {
    logger: Arc<Logger>,
}

impl Log for LogWrapper {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() as u32 <= self.logger.level.load(Relaxed)
    }

    fn log(&self, record: &Record) {
        if record.level() as u32 > self.logger.level.load(Relaxed) {
            return;
        }
        BUFFER.with_borrow_mut(|buffer| {
            buffer.clear();
            let now = humantime::format_rfc3339_millis(SystemTime::now());
            let _ = match record.module_path() {
                Some(mp) => writeln!(
                    buffer,
                    "[{} {:5} {}] {}",
                    now,
                    record.level(),
                    mp,
                    record.args(),
                ),
                None => writeln!(buffer, "[{} {:5}] {}", now, record.level(), record.args()),
            };
            let mut fd = Fd::new(self.logger.file.raw());
            let _ = fd.write_all(buffer);
        });
    }

    fn flush(&self) {
        // nothing
    }
}
