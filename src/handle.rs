use std::{cell::Cell, fmt};

use crossbeam::epoch::{Guard, LocalHandle};

/// Handle участника очереди, принадлежит вызывающему потоку.
///
/// Хранит epoch-слот потока и счетчик contention. Не `Send`:
/// один handle живет в одном потоке.
pub struct QueueHandle {
    local: LocalHandle,
    contention: Cell<u64>,
}

impl QueueHandle {
    pub(crate) fn new(local: LocalHandle) -> Self {
        Self {
            local,
            contention: Cell::new(0),
        }
    }

    /// Пока guard жив, узлы не освобождаются. Другие потоки не блокируются.
    #[inline]
    pub fn pin(&self) -> Guard {
        self.local.pin()
    }

    #[inline]
    pub(crate) fn counter(&self) -> &Cell<u64> {
        &self.contention
    }

    pub fn is_pinned(&self) -> bool {
        self.local.is_pinned()
    }

    /// Неудачные CAS через этот handle
    pub fn contention(&self) -> u64 {
        self.contention.get()
    }
}

impl fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("contention", &self.contention.get())
            .finish_non_exhaustive()
    }
}
