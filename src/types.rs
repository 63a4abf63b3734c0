/// Opaque caller-supplied identifier for one remote dispatch call.
/// Example: `mon-1708412345-17`
pub type CallTag = String;
/// Derived string identifying a logical display grouping.
/// Examples: `IRCA`, `MCSA_2`
pub type GroupingKey = String;
/// Canonical frame identifier parsed from an arrival filename.
/// Example: `MCSA00012345`
pub type FrameId = String;
/// Name of a dispatchable method registered in the allow-list.
/// Examples: `confirmation`, `userinput`, `sleep`
pub type MethodName = String;
/// Pub/sub channel group used as the routing namespace for results.
/// Example: `tasks`
pub type ChannelName = String;
