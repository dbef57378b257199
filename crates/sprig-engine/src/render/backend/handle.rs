use std::num::NonZeroU32;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Builds the handle for the `index`-th resource of a backend.
            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                let raw = u32::try_from(index + 1).unwrap_or(u32::MAX);
                // `index + 1` is at least 1.
                Self(NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN))
            }

            /// Slot index inside the owning backend.
            #[inline]
            pub(crate) fn index(self) -> usize {
                (self.0.get() - 1) as usize
            }

            #[inline]
            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }
    };
}

gpu_handle!(
    /// Compiled shader program. There is no null program.
    ProgramHandle
);
gpu_handle!(
    /// Uploaded vertex + index buffer pair.
    MeshHandle
);
gpu_handle!(
    /// Uploaded texture. There is no null texture.
    TextureHandle
);
