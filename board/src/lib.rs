pub mod sim;

pub mod board {
    use embedded_hal::digital::{ErrorKind, InputPin, OutputPin};
    use semver::Version;

    /// Failures reported by the controller board transport.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum BoardError {
        #[error("connection to the board was lost")]
        ConnectionLost,

        #[error("interrupted while waiting on the board")]
        Interrupted,

        #[error("pin {0} is not available")]
        PinUnavailable(u8),
    }

    impl embedded_hal::digital::Error for BoardError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// A digital output line opened on the board.
    pub type OutputLine = Box<dyn OutputPin<Error = BoardError> + Send>;

    /// A digital input line opened on the board.
    pub type InputLine = Box<dyn InputPin<Error = BoardError> + Send>;

    /// Identity reported by a board when the connection is established.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct BoardInfo {
        pub name: String,
        pub firmware: Version,
    }

    /// The transport to the controller board.
    ///
    /// Every call may fail with [`BoardError::ConnectionLost`] or
    /// [`BoardError::Interrupted`]; lines opened through a board keep failing
    /// the same way once the connection is gone.
    pub trait Board: Send + Sync {
        fn info(&self) -> BoardInfo;

        fn open_digital_output(&self, pin: u8, initial_high: bool) -> Result<OutputLine, BoardError>;

        fn open_digital_input(&self, pin: u8) -> Result<InputLine, BoardError>;
    }
}

pub use board::{Board, BoardError, BoardInfo, InputLine, OutputLine};
