use bitflags::bitflags;

bitflags! {
    /// The block header `flags` byte (`spec.md` §4.G). `COLSEP` unset means
    /// the 0x1F in-stream separator discipline, set means varint-length
    /// prefixing. `STRATEGY` unset means Strict, set means Aggressive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BlockFlags: u8 {
        const OPAQUE   = 0b0000_0001;
        const INDEXED  = 0b0000_0010;
        const COLSEP   = 0b0000_0100;
        const STRATEGY = 0b0000_1000;
    }
}
