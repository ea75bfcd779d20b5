/// Writes issued per benchmarked response
pub const INNER_LOOP_COUNT: usize = 512;

/// Size of every benchmarked write
pub const WRITE_SIZE: usize = 1024;

#[derive(Debug, Copy, Clone)]
pub struct WriteCase {
    name: &'static str,
    framing: Framing,
    flavour: WriteFlavour,
}

impl WriteCase {
    pub fn new(name: &'static str, framing: Framing, flavour: WriteFlavour) -> Self {
        Self { name, framing, flavour }
    }

    pub fn content_length(name: &'static str, flavour: WriteFlavour) -> Self {
        Self::new(name, Framing::ContentLength, flavour)
    }

    pub fn chunked(name: &'static str, flavour: WriteFlavour) -> Self {
        Self::new(name, Framing::Chunked, flavour)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn flavour(&self) -> WriteFlavour {
        self.flavour
    }

    /// Body bytes one iteration hands to the pipeline.
    pub fn payload_bytes(&self) -> u64 {
        match self.flavour {
            WriteFlavour::ProduceEnd => 0,
            _ => (INNER_LOOP_COUNT * WRITE_SIZE) as u64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    ContentLength,
    Chunked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteFlavour {
    Write,
    WriteAsync,
    WriteAsyncAwaited,
    ProduceEnd,
}

/// The response matrix: every write flavour under both framing modes.
pub fn write_cases() -> Vec<WriteCase> {
    vec![
        WriteCase::content_length("write", WriteFlavour::Write),
        WriteCase::chunked("write_chunked", WriteFlavour::Write),
        WriteCase::content_length("write_async", WriteFlavour::WriteAsync),
        WriteCase::chunked("write_async_chunked", WriteFlavour::WriteAsync),
        WriteCase::content_length("write_async_awaited", WriteFlavour::WriteAsyncAwaited),
        WriteCase::chunked("write_async_awaited_chunked", WriteFlavour::WriteAsyncAwaited),
        WriteCase::content_length("produce_end", WriteFlavour::ProduceEnd),
        WriteCase::chunked("produce_end_chunked", WriteFlavour::ProduceEnd),
    ]
}
