/// One of the six GATT characteristics the CodeLess/DSPS service pair exposes.
///
/// See the service table: the CodeLess pair carries line-oriented AT-style
/// text, the DSPS pair carries binary stream chunks, and each protocol has
/// its own flow-control notification characteristic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Characteristic {
    /// Host → peer: outgoing CodeLess text (write).
    CodelessInbound,
    /// Peer → host: incoming CodeLess text (read).
    CodelessOutbound,
    /// Peer → host: `0x01` data-ready notification (notify).
    CodelessFlow,
    /// Host → peer: outgoing binary stream chunks (write-without-response).
    DspsServerRx,
    /// Peer → host: incoming binary stream (notify).
    DspsServerTx,
    /// Both directions: `0x01` XON / `0x02` XOFF (notify + write).
    DspsFlow,
}
