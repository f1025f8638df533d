//! Per-architecture layer relationships.

use crate::netlist::ChannelType;

use super::Layer;

/// Describes how the layers of a device architecture connect.
///
/// One implementation exists per [`TechKind`](super::TechKind) family.
pub trait LayerMap: Send + Sync {
    /// Device layers that routing reaches through a via into metal 1.
    fn access_layers(&self) -> &'static [Layer];

    /// The via joining the access layer `access` to metal 1.
    fn access_via(&self, access: Layer) -> Option<Layer>;

    /// The source/drain contact layer of the given channel type.
    fn sd_contact(&self, channel: ChannelType) -> Layer;

    /// Layer pairs that are electrically connected wherever they overlap.
    fn connections(&self) -> &'static [(Layer, Layer)];

    /// Layers that a technology of this architecture must declare.
    fn required_layers(&self) -> &'static [Layer];

    /// Via layers whose cuts land on `layer` from above.
    fn vias_landing_on(&self, layer: Layer) -> Vec<Layer> {
        if layer == Layer::Metal1 {
            return vec![Layer::Via1];
        }
        self.connections()
            .iter()
            .filter_map(|&(a, b)| match (a == layer, b == layer) {
                (true, _) if b.is_via() && b != Layer::Via1 => Some(b),
                (_, true) if a.is_via() && a != Layer::Via1 => Some(a),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` if `a` and `b` connect where they overlap.
    fn connects(&self, a: Layer, b: Layer) -> bool {
        self.connections()
            .iter()
            .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Every via layer used by this architecture.
    fn via_layers(&self) -> Vec<Layer> {
        let mut vias = self
            .access_layers()
            .iter()
            .filter_map(|l| self.access_via(*l))
            .collect::<Vec<_>>();
        vias.push(Layer::Via1);
        vias.sort();
        vias.dedup();
        vias
    }
}

/// Layers of a complementary FET, with PMOS stacked above NMOS.
///
/// Lower tier contacts reach metal 1 through a deep via; upper tier contacts use `via0`.
/// Overlapping contacts of the two tiers form one conductor.
#[derive(Debug, Default, Copy, Clone)]
pub struct CfetLayers;

/// Layers of planar architectures (GAA, FinFET and multi-height GAA).
///
/// Contacts are not distinguished by polarity: `via0` and `via_gate` both land on
/// either contact layer.
#[derive(Debug, Default, Copy, Clone)]
pub struct PlanarLayers;

const CFET_CONNECTIONS: [(Layer, Layer); 12] = [
    (Layer::Ndiff, Layer::DiffCon),
    (Layer::Pdiff, Layer::DiffConTop),
    (Layer::DiffCon, Layer::DiffConTop),
    (Layer::Poly, Layer::GateCon),
    (Layer::DiffCon, Layer::ViaDeep),
    (Layer::ViaDeep, Layer::Metal1),
    (Layer::DiffConTop, Layer::Via0),
    (Layer::Via0, Layer::Metal1),
    (Layer::GateCon, Layer::ViaGate),
    (Layer::ViaGate, Layer::Metal1),
    (Layer::Metal1, Layer::Via1),
    (Layer::Via1, Layer::Metal2),
];

const PLANAR_CONNECTIONS: [(Layer, Layer); 11] = [
    (Layer::Ndiff, Layer::DiffCon),
    (Layer::Pdiff, Layer::DiffCon),
    (Layer::Poly, Layer::GateCon),
    (Layer::DiffCon, Layer::Via0),
    (Layer::GateCon, Layer::Via0),
    (Layer::DiffCon, Layer::ViaGate),
    (Layer::GateCon, Layer::ViaGate),
    (Layer::Via0, Layer::Metal1),
    (Layer::ViaGate, Layer::Metal1),
    (Layer::Metal1, Layer::Via1),
    (Layer::Via1, Layer::Metal2),
];

impl LayerMap for CfetLayers {
    fn access_layers(&self) -> &'static [Layer] {
        &[Layer::DiffCon, Layer::DiffConTop, Layer::GateCon]
    }

    fn access_via(&self, access: Layer) -> Option<Layer> {
        match access {
            Layer::DiffCon => Some(Layer::ViaDeep),
            Layer::DiffConTop => Some(Layer::Via0),
            Layer::GateCon => Some(Layer::ViaGate),
            _ => None,
        }
    }

    fn sd_contact(&self, channel: ChannelType) -> Layer {
        match channel {
            ChannelType::Nmos => Layer::DiffCon,
            ChannelType::Pmos => Layer::DiffConTop,
        }
    }

    fn connections(&self) -> &'static [(Layer, Layer)] {
        &CFET_CONNECTIONS
    }

    fn required_layers(&self) -> &'static [Layer] {
        &[
            Layer::Ndiff,
            Layer::Pdiff,
            Layer::Poly,
            Layer::DiffCon,
            Layer::DiffConTop,
            Layer::GateCon,
            Layer::Metal1,
        ]
    }
}

impl LayerMap for PlanarLayers {
    fn access_layers(&self) -> &'static [Layer] {
        &[Layer::DiffCon, Layer::GateCon]
    }

    fn access_via(&self, access: Layer) -> Option<Layer> {
        match access {
            Layer::DiffCon => Some(Layer::Via0),
            Layer::GateCon => Some(Layer::ViaGate),
            _ => None,
        }
    }

    fn sd_contact(&self, _channel: ChannelType) -> Layer {
        Layer::DiffCon
    }

    fn connections(&self) -> &'static [(Layer, Layer)] {
        &PLANAR_CONNECTIONS
    }

    fn required_layers(&self) -> &'static [Layer] {
        &[
            Layer::Ndiff,
            Layer::Pdiff,
            Layer::Poly,
            Layer::DiffCon,
            Layer::GateCon,
            Layer::Metal1,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planar_vias_are_interchangeable() {
        let map = PlanarLayers;
        for via in [Layer::Via0, Layer::ViaGate] {
            assert!(map.connects(via, Layer::DiffCon));
            assert!(map.connects(via, Layer::GateCon));
            assert!(map.connects(Layer::Metal1, via));
        }
        assert_eq!(
            map.vias_landing_on(Layer::DiffCon),
            vec![Layer::Via0, Layer::ViaGate]
        );
    }

    #[test]
    fn cfet_contacts_have_dedicated_vias() {
        let map = CfetLayers;
        assert_eq!(map.access_via(Layer::DiffCon), Some(Layer::ViaDeep));
        assert_eq!(map.access_via(Layer::DiffConTop), Some(Layer::Via0));
        assert!(!map.connects(Layer::Via0, Layer::DiffCon));
        assert!(!map.connects(Layer::DiffCon, Layer::Pdiff));
        assert_eq!(map.vias_landing_on(Layer::DiffCon), vec![Layer::ViaDeep]);
        assert_eq!(map.vias_landing_on(Layer::Metal1), vec![Layer::Via1]);
        assert_eq!(
            map.via_layers(),
            vec![Layer::Via0, Layer::ViaGate, Layer::ViaDeep, Layer::Via1]
        );
    }
}
