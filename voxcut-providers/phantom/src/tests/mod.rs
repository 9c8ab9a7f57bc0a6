pub(crate) use super::{PhantomBuilder, PhantomError, PhantomSource, dice};

mod generation;
