/// Latch suppressing repeated readings while a stimulus stays present.
///
/// Admits exactly one reading per continuous presence interval. Only an
/// explicit absence re-opens it.
#[derive(Debug, Default)]
pub struct CaptureGuard {
    latched: bool,
}

impl CaptureGuard {
    /// Feed one poll result. Returns `true` when the reading should be emitted.
    pub fn admit(&mut self, present: bool) -> bool {
        if !present {
            self.latched = false;
            return false;
        }
        if self.latched {
            return false;
        }
        self.latched = true;
        true
    }

    #[cfg(test)]
    pub fn is_latched(&self) -> bool {
        self.latched
    }
}
